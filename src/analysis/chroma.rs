// ChromaClassifier - reference key estimator
//
// Folds an STFT of the window into a 12-bin pitch-class profile and picks
// the key whose rotated Krumhansl-Kessler profile correlates best with it.
// No chroma smoothing or tuning-offset estimation.

use super::classifier::{Classification, KeyClassifier};
use super::fft::FftProcessor;
use super::key::Key;

/// Krumhansl-Kessler major profile, tonic first
const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
/// Krumhansl-Kessler minor profile, tonic first
const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Chroma analysis parameters
#[derive(Debug, Clone)]
pub struct ChromaConfig {
    /// STFT frame size in samples
    pub fft_size: usize,
    /// Hop between frames in samples
    pub hop_size: usize,
    /// Lowest frequency folded into the chroma (Hz)
    pub min_hz: f32,
    /// Highest frequency folded into the chroma (Hz)
    pub max_hz: f32,
    /// Windows with RMS below this are reported as silence
    pub silence_rms: f32,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            fft_size: 4096,
            hop_size: 2048,
            min_hz: 60.0,
            max_hz: 2000.0,
            silence_rms: 0.002,
        }
    }
}

/// Chromagram + key-profile correlation classifier
pub struct ChromaClassifier {
    config: ChromaConfig,
    fft: FftProcessor,
    magnitudes: Vec<f32>,
    /// Pitch class per FFT bin for `mapped_rate`, `None` outside the band
    bin_pitch_classes: Vec<Option<usize>>,
    mapped_rate: u32,
}

impl ChromaClassifier {
    pub fn new(config: ChromaConfig) -> Self {
        let fft = FftProcessor::new(config.fft_size);
        Self {
            config,
            fft,
            magnitudes: Vec::new(),
            bin_pitch_classes: Vec::new(),
            mapped_rate: 0,
        }
    }

    fn map_bins(&mut self, sample_rate: u32) {
        if self.mapped_rate == sample_rate {
            return;
        }
        let fft_size = self.fft.fft_size();
        let bin_hz = sample_rate as f32 / fft_size as f32;

        self.bin_pitch_classes = (0..=fft_size / 2)
            .map(|bin| {
                let freq = bin as f32 * bin_hz;
                if freq < self.config.min_hz || freq > self.config.max_hz {
                    return None;
                }
                let midi = 69.0 + 12.0 * (freq / 440.0).log2();
                Some((midi.round() as i64).rem_euclid(12) as usize)
            })
            .collect();
        self.mapped_rate = sample_rate;
    }

    /// Pitch-class energy summed over all frames of the window
    pub fn chromagram(&mut self, samples: &[f32], sample_rate: u32) -> [f32; 12] {
        self.map_bins(sample_rate);

        let fft_size = self.fft.fft_size();
        let hop = self.config.hop_size.max(1);
        let mut chroma = [0.0f32; 12];

        let mut start = 0;
        loop {
            let end = (start + fft_size).min(samples.len());
            self.fft
                .magnitude_spectrum(&samples[start..end], &mut self.magnitudes);
            for (magnitude, pitch_class) in self.magnitudes.iter().zip(&self.bin_pitch_classes) {
                if let Some(pc) = pitch_class {
                    chroma[*pc] += magnitude;
                }
            }

            start += hop;
            if start + fft_size > samples.len() {
                break;
            }
        }

        chroma
    }
}

impl Default for ChromaClassifier {
    fn default() -> Self {
        Self::new(ChromaConfig::default())
    }
}

impl KeyClassifier for ChromaClassifier {
    fn classify(&mut self, samples: &[f32], sample_rate: u32) -> Classification {
        if samples.is_empty() || rms(samples) < self.config.silence_rms {
            return Classification::Silence;
        }

        let chroma = self.chromagram(samples, sample_rate);
        best_key(&chroma).map_or(Classification::Silence, Classification::from)
    }
}

fn rms(samples: &[f32]) -> f32 {
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squares / samples.len() as f64).sqrt() as f32
}

/// Key with the highest profile correlation; `None` for a flat chroma.
fn best_key(chroma: &[f32; 12]) -> Option<Key> {
    let mut best: Option<(Key, f32)> = None;

    for tonic in 0..12 {
        for (minor, profile) in [(false, &MAJOR_PROFILE), (true, &MINOR_PROFILE)] {
            let Some(score) = correlation(chroma, profile, tonic) else {
                return None;
            };
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((Key::from_tonic(tonic, minor), score));
            }
        }
    }

    best.map(|(key, _)| key)
}

/// Pearson correlation of the chroma with a profile rotated to `tonic`.
fn correlation(chroma: &[f32; 12], profile: &[f32; 12], tonic: usize) -> Option<f32> {
    let chroma_mean = chroma.iter().sum::<f32>() / 12.0;
    let profile_mean = profile.iter().sum::<f32>() / 12.0;

    let mut covariance = 0.0;
    let mut chroma_var = 0.0;
    let mut profile_var = 0.0;
    for (pc, &energy) in chroma.iter().enumerate() {
        let x = energy - chroma_mean;
        let y = profile[(pc + 12 - tonic) % 12] - profile_mean;
        covariance += x * y;
        chroma_var += x * x;
        profile_var += y * y;
    }

    let denominator = (chroma_var * profile_var).sqrt();
    (denominator > f32::EPSILON).then(|| covariance / denominator)
}
