// FFT module - windowed magnitude spectra for the chroma classifier
//
// The plan, Hann window and scratch buffers are created once; computing a
// spectrum afterwards does not allocate.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// FFT processor that computes magnitude spectra from audio frames
pub struct FftProcessor {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    /// Hann window for FFT (pre-computed)
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl FftProcessor {
    /// Create a new FFT processor
    ///
    /// # Arguments
    /// * `fft_size` - FFT frame size in samples
    pub fn new(fft_size: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(fft_size);

        // Pre-compute Hann window to reduce spectral leakage
        let window = (0..fft_size)
            .map(|i| {
                0.5 * (1.0
                    - ((2.0 * std::f32::consts::PI * i as f32) / (fft_size as f32 - 1.0)).cos())
            })
            .collect();
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Self {
            fft,
            fft_size,
            window,
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute the magnitude spectrum of one frame
    ///
    /// Frames shorter than `fft_size` are zero-padded.
    ///
    /// # Arguments
    /// * `frame` - Audio frame (only the first `fft_size` samples are used)
    /// * `magnitudes` - Output, resized to `fft_size / 2 + 1` bins
    pub fn magnitude_spectrum(&mut self, frame: &[f32], magnitudes: &mut Vec<f32>) {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.buffer, &mut self.scratch);

        magnitudes.clear();
        magnitudes.extend(self.buffer[..self.fft_size / 2 + 1].iter().map(|c| c.norm()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let fft_size = 1024;
        let sample_rate = 8_000.0;
        let bin = 64;
        let freq = bin as f32 * sample_rate / fft_size as f32;
        let frame: Vec<f32> = (0..fft_size)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin())
            .collect();

        let mut processor = FftProcessor::new(fft_size);
        let mut magnitudes = Vec::new();
        processor.magnitude_spectrum(&frame, &mut magnitudes);

        assert_eq!(magnitudes.len(), fft_size / 2 + 1);
        let peak = magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, bin);
    }

    #[test]
    fn test_short_frame_is_zero_padded() {
        let mut processor = FftProcessor::new(256);
        let mut magnitudes = Vec::new();
        processor.magnitude_spectrum(&[0.0; 10], &mut magnitudes);
        assert_eq!(magnitudes.len(), 129);
        assert!(magnitudes.iter().all(|&m| m == 0.0));
    }
}
