//! Decimating ingest - the audio-thread half of the pipeline.
//!
//! Downmixes interleaved 16-bit stereo to mono, keeps every
//! [`DECIMATION`]th sample and appends it to the active pool buffer. When a
//! window is full it is offered to the analysis thread through the
//! [`WindowSlot`](super::handoff::WindowSlot).
//!
//! # Real-Time Safety
//! `feed` is bounded by the frame count and performs:
//! - No heap allocation
//! - No locks or waiting
//! - Only atomic loads/stores for publication and counters
//!
//! There is no anti-aliasing filter ahead of the decimator. Content above
//! the decimated Nyquist frequency folds into the analysis band; this is a
//! known accuracy trade-off kept for CPU cost.

use super::handoff::ReadyWindow;
use crate::config::DECIMATION;
use crate::context::AnalysisContext;

/// Full-scale value of the 16-bit input domain
const PCM_SCALE: f32 = 32768.0;

/// Producer-private cursors; never touched by the analysis thread
#[derive(Debug)]
pub struct DecimatingIngest {
    active: usize,
    write_position: usize,
    decimation_counter: usize,
    window_samples: usize,
    generation: u32,
}

impl DecimatingIngest {
    /// # Arguments
    /// * `window_samples` - Window length at the decimated rate
    /// * `generation` - Configuration generation stamped on published windows
    pub fn new(window_samples: usize, generation: u32) -> Self {
        Self {
            active: 0,
            write_position: 0,
            decimation_counter: 0,
            window_samples: window_samples.max(1),
            generation,
        }
    }

    /// Discard the partial window and start over with a new length.
    ///
    /// Keeps the current active buffer: it is never the leased one.
    pub fn reset(&mut self, window_samples: usize, generation: u32) {
        self.write_position = 0;
        self.decimation_counter = 0;
        self.window_samples = window_samples.max(1);
        self.generation = generation;
    }

    /// Consume one block of interleaved stereo frames.
    ///
    /// A trailing half frame is ignored; an empty block is a no-op.
    pub fn feed(&mut self, context: &AnalysisContext, stereo: &[i16]) {
        let pool = context.pool();
        let window_samples = self.window_samples.min(pool.capacity());

        for frame in stereo.chunks_exact(2) {
            if self.decimation_counter == 0 {
                let left = frame[0] as f32 / PCM_SCALE;
                let right = frame[1] as f32 / PCM_SCALE;

                // SAFETY: `self.active` is the producer's buffer; the slot
                // never lets it be leased while active.
                unsafe { pool.write(self.active, self.write_position, (left + right) * 0.5) };
                self.write_position += 1;

                if self.write_position >= window_samples {
                    self.complete_window(context);
                }
            }
            self.decimation_counter = (self.decimation_counter + 1) % DECIMATION;
        }
    }

    fn complete_window(&mut self, context: &AnalysisContext) {
        let window = ReadyWindow {
            index: self.active,
            len: self.write_position,
            generation: self.generation,
        };

        match context.slot().try_publish(window) {
            Ok(next) => {
                self.active = next;
                context.stats().record_published();
            }
            // Consumer still busy: overwrite this buffer from the start
            Err(_) => context.stats().record_dropped(),
        }
        self.write_position = 0;
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn write_position(&self) -> usize {
        self.write_position
    }

    pub fn window_samples(&self) -> usize {
        self.window_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> AnalysisContext {
        AnalysisContext::new(44_100).unwrap()
    }

    fn constant_block(frames: usize, left: i16, right: i16) -> Vec<i16> {
        (0..frames).flat_map(|_| [left, right]).collect()
    }

    #[test]
    fn test_decimates_by_factor() {
        let context = context();
        let mut ingest = DecimatingIngest::new(1_000, 0);

        ingest.feed(&context, &constant_block(128, 0, 0));
        assert_eq!(ingest.write_position(), 128 / DECIMATION);

        // Counter carries across blocks: 3 frames then 1 frame = one sample
        let mut ingest = DecimatingIngest::new(1_000, 0);
        ingest.feed(&context, &constant_block(3, 0, 0));
        assert_eq!(ingest.write_position(), 1);
        ingest.feed(&context, &constant_block(1, 0, 0));
        assert_eq!(ingest.write_position(), 1);
        ingest.feed(&context, &constant_block(1, 0, 0));
        assert_eq!(ingest.write_position(), 2);
    }

    #[test]
    fn test_downmix_and_normalisation() {
        let context = context();
        let mut ingest = DecimatingIngest::new(4, 0);

        // 16 frames -> 4 retained samples -> one published window
        ingest.feed(&context, &constant_block(16, 16_384, -32_768));
        let claimed = context.claim().expect("window should be published");
        for &sample in claimed.samples() {
            assert!((sample - (-0.25)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_publish_switches_buffer() {
        let context = context();
        let mut ingest = DecimatingIngest::new(8, 0);

        ingest.feed(&context, &constant_block(8 * DECIMATION, 100, 100));
        assert_eq!(ingest.active_index(), 1);
        assert_eq!(context.slot().active_index(), 1);
        assert_eq!(ingest.write_position(), 0);

        let ready = context.slot().peek().unwrap();
        assert_eq!(ready.index, 0);
        assert_eq!(ready.len, 8);
        assert_eq!(context.stats().snapshot().windows_published, 1);
    }

    #[test]
    fn test_occupied_slot_drops_window_and_rewinds() {
        let context = context();
        let mut ingest = DecimatingIngest::new(8, 0);

        ingest.feed(&context, &constant_block(8 * DECIMATION, 1, 1));
        // Nobody drains: the next three windows are dropped in place
        ingest.feed(&context, &constant_block(3 * 8 * DECIMATION, 2, 2));

        assert_eq!(ingest.active_index(), 1);
        assert_eq!(ingest.write_position(), 0);
        let snapshot = context.stats().snapshot();
        assert_eq!(snapshot.windows_published, 1);
        assert_eq!(snapshot.windows_dropped, 3);

        // The published window is untouched by the dropped ones
        let claimed = context.claim().unwrap();
        assert_eq!(claimed.index(), 0);
        assert!(claimed.samples().iter().all(|&s| s == 1.0 / PCM_SCALE));
    }

    #[test]
    fn test_empty_and_odd_blocks() {
        let context = context();
        let mut ingest = DecimatingIngest::new(8, 0);

        ingest.feed(&context, &[]);
        assert_eq!(ingest.write_position(), 0);

        // Trailing half frame is ignored
        ingest.feed(&context, &[1, 1, 7]);
        assert_eq!(ingest.write_position(), 1);
    }

    #[test]
    fn test_reset_discards_partial_window() {
        let context = context();
        let mut ingest = DecimatingIngest::new(100, 0);

        ingest.feed(&context, &constant_block(50 * DECIMATION + 2, 0, 0));
        assert_eq!(ingest.write_position(), 51);

        ingest.reset(200, 1);
        assert_eq!(ingest.write_position(), 0);
        assert_eq!(ingest.window_samples(), 200);

        ingest.feed(&context, &constant_block(200 * DECIMATION, 0, 0));
        assert_eq!(context.slot().peek().unwrap().generation, 1);
    }
}
