// AnalysisContext: state shared by the audio thread and the analysis thread
//
// One context per detector instance, owned through an Arc by the detector
// handle and the analysis worker. Every cross-thread field is an atomic or
// is partitioned by the WindowSlot protocol; producer-private cursors live
// in DecimatingIngest and consumer-private votes live in the worker.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use crate::analysis::key::Key;
use crate::audio::handoff::{ClaimedWindow, WindowSlot};
use crate::audio::window_pool::WindowPool;
use crate::config::{
    BUFFER_HEADROOM, DECIMATION, MAX_SAMPLE_RATE, MAX_WINDOW_SECONDS, MIN_SAMPLE_RATE,
};
use crate::error::KeyDetectError;
use crate::telemetry::PipelineStats;

const NO_KEY_CODE: u64 = 0xFF;

/// Pack a displayed key together with the generation it was decided under
fn pack_displayed(generation: u32, key: Option<Key>) -> u64 {
    let code = key.map(|k| k.index() as u64).unwrap_or(NO_KEY_CODE);
    ((generation as u64) << 8) | code
}

fn unpack_displayed(word: u64) -> (u32, Option<Key>) {
    let generation = (word >> 8) as u32;
    let key = match word & 0xFF {
        NO_KEY_CODE => None,
        code => Key::from_index(code as usize),
    };
    (generation, key)
}

/// Shared pipeline state for one audio stream
pub struct AnalysisContext {
    pool: WindowPool,
    slot: WindowSlot,
    /// Bumped by every window resize; windows and results carry it
    generation: AtomicU32,
    displayed: AtomicU64,
    stats: PipelineStats,
    sample_rate: u32,
}

impl AnalysisContext {
    /// Allocate the context and both window buffers
    ///
    /// Buffers are sized for the longest supported window at the decimated
    /// rate, so resizing never allocates.
    pub fn new(sample_rate: u32) -> Result<Self, KeyDetectError> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(KeyDetectError::InvalidSampleRate { sample_rate });
        }

        let decimated_rate = sample_rate / DECIMATION as u32;
        let capacity =
            (MAX_WINDOW_SECONDS * decimated_rate as f32).ceil() as usize + BUFFER_HEADROOM;

        Ok(Self {
            pool: WindowPool::new(capacity)?,
            slot: WindowSlot::new(),
            generation: AtomicU32::new(0),
            displayed: AtomicU64::new(pack_displayed(0, None)),
            stats: PipelineStats::default(),
            sample_rate,
        })
    }

    /// Input sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Rate the classifier observes after decimation
    pub fn decimated_rate(&self) -> u32 {
        self.sample_rate / DECIMATION as u32
    }

    /// Window length in decimated samples for a (clamped) duration
    pub fn window_samples(&self, seconds: f32) -> usize {
        let samples = (seconds * self.decimated_rate() as f32) as usize;
        samples.clamp(1, self.pool.capacity())
    }

    pub fn pool(&self) -> &WindowPool {
        &self.pool
    }

    pub fn slot(&self) -> &WindowSlot {
        &self.slot
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Claim the pending window for analysis (consumer only)
    pub fn claim(&self) -> Option<ClaimedWindow<'_>> {
        self.slot.claim(&self.pool)
    }

    /// Current configuration generation
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Start a new configuration generation.
    ///
    /// Drops any pending window and makes the displayed key read as "no key"
    /// until the worker votes under the new generation.
    pub(crate) fn advance_generation(&self) -> u32 {
        if self.slot.clear() {
            self.stats.record_stale();
        }
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.displayed
            .store(pack_displayed(generation, None), Ordering::Release);
        generation
    }

    /// Store the displayed key decided under `generation` (consumer only)
    pub(crate) fn publish_key(&self, generation: u32, key: Key) {
        self.displayed
            .store(pack_displayed(generation, Some(key)), Ordering::Release);
    }

    /// Displayed key, `None` before the first vote of the current generation
    pub fn current_key(&self) -> Option<Key> {
        let (generation, key) = unpack_displayed(self.displayed.load(Ordering::Acquire));
        if generation == self.generation() {
            key
        } else {
            None
        }
    }
}
