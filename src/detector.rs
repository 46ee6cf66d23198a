// KeyDetector - public handle over one detector instance
//
// Owns the producer-private ingest state and the analysis thread. `feed` is
// the only method meant for the audio thread; everything else is control or
// UI surface and may take longer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::broadcast;

use crate::analysis::classifier::KeyClassifier;
use crate::analysis::key::{Key, NO_KEY_DISPLAY};
use crate::analysis::{spawn_analysis_thread, KeyUpdate, WorkerSettings};
use crate::audio::ingest::DecimatingIngest;
use crate::config::{clamp_window_seconds, DetectorConfig};
use crate::context::AnalysisContext;
use crate::error::{log_detector_error, KeyDetectError};
use crate::telemetry::StatsSnapshot;

/// Capacity of the key update broadcast channel
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Real-time musical key detector for one stereo stream
///
/// Created per audio stream. The analysis thread is running when
/// construction returns and is joined when the detector is dropped.
///
/// # Example
/// ```no_run
/// use keydetect::{ChromaClassifier, KeyDetector};
///
/// let mut detector = KeyDetector::new(44_100, ChromaClassifier::default())?;
/// let block = vec![0i16; 256]; // 128 stereo frames
/// detector.feed(&block);
/// println!("{}", detector.current_key_display());
/// # Ok::<(), keydetect::KeyDetectError>(())
/// ```
pub struct KeyDetector {
    context: Arc<AnalysisContext>,
    ingest: DecimatingIngest,
    window_seconds: f32,
    updates: broadcast::Sender<KeyUpdate>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl KeyDetector {
    /// Create a detector with the default configuration
    ///
    /// # Arguments
    /// * `sample_rate` - Input sample rate in Hz (8000-192000)
    /// * `classifier` - Key estimator run on the analysis thread
    pub fn new<C>(sample_rate: u32, classifier: C) -> Result<Self, KeyDetectError>
    where
        C: KeyClassifier + 'static,
    {
        Self::with_config(sample_rate, classifier, &DetectorConfig::default())
    }

    /// Create a detector with explicit tuning
    ///
    /// # Errors
    /// `InvalidSampleRate`, `BufferAllocationFailed` or `WorkerSpawnFailed`;
    /// nothing is left running on failure.
    pub fn with_config<C>(
        sample_rate: u32,
        classifier: C,
        config: &DetectorConfig,
    ) -> Result<Self, KeyDetectError>
    where
        C: KeyClassifier + 'static,
    {
        let context = match AnalysisContext::new(sample_rate) {
            Ok(context) => Arc::new(context),
            Err(err) => {
                log_detector_error(&err, "KeyDetector::with_config");
                return Err(err);
            }
        };

        let window_seconds = clamp_window_seconds(config.window_seconds);
        let ingest = DecimatingIngest::new(
            context.window_samples(window_seconds),
            context.generation(),
        );

        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = spawn_analysis_thread(
            Arc::clone(&context),
            Box::new(classifier),
            Arc::clone(&shutdown),
            WorkerSettings::from(config),
            updates.clone(),
        )
        .map_err(|e| {
            let err = KeyDetectError::from(e);
            log_detector_error(&err, "KeyDetector::with_config");
            err
        })?;

        tracing::info!(
            "[KeyDetector] Created (sample_rate={} Hz, window={:.1} s, buffer={} samples)",
            sample_rate,
            window_seconds,
            context.pool().capacity()
        );

        Ok(Self {
            context,
            ingest,
            window_seconds,
            updates,
            shutdown,
            worker: Some(worker),
        })
    }

    /// Push one block of interleaved 16-bit stereo frames.
    ///
    /// Real-time safe: no allocation, no locks, no waiting. Never blocks on
    /// the analysis thread; windows completed while it is busy are dropped.
    pub fn feed(&mut self, stereo: &[i16]) {
        self.ingest.feed(&self.context, stereo);
    }

    /// Displayed key, `None` before the first vote of the current window
    /// configuration
    pub fn current_key(&self) -> Option<Key> {
        self.context.current_key()
    }

    /// Displayed key name, or `"---"` when there is none
    pub fn current_key_display(&self) -> &'static str {
        self.current_key()
            .map(Key::display_name)
            .unwrap_or(NO_KEY_DISPLAY)
    }

    /// Change the analysis window length.
    ///
    /// The value is clamped to 1.0-8.0 s. The partial window, any pending
    /// window, all votes and the displayed key are discarded.
    ///
    /// # Returns
    /// The clamped window length actually applied
    pub fn set_window(&mut self, seconds: f32) -> f32 {
        let seconds = clamp_window_seconds(seconds);
        let generation = self.context.advance_generation();
        self.ingest
            .reset(self.context.window_samples(seconds), generation);
        self.window_seconds = seconds;

        tracing::info!(
            "[KeyDetector] Window set to {:.1} s (generation {})",
            seconds,
            generation
        );
        seconds
    }

    /// Current window length in seconds
    pub fn window(&self) -> f32 {
        self.window_seconds
    }

    pub fn sample_rate(&self) -> u32 {
        self.context.sample_rate()
    }

    /// Read-only handle for other threads
    pub fn reader(&self) -> KeyReader {
        KeyReader {
            context: Arc::clone(&self.context),
        }
    }

    /// Subscribe to accepted votes
    pub fn subscribe(&self) -> broadcast::Receiver<KeyUpdate> {
        self.updates.subscribe()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.context.stats().snapshot()
    }

    /// `true` while a window is waiting or being classified
    pub fn has_pending_work(&self) -> bool {
        let slot = self.context.slot();
        slot.is_occupied() || slot.leased_index().is_some()
    }
}

impl Drop for KeyDetector {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            if worker.join().is_err() {
                log_detector_error(&KeyDetectError::WorkerPanicked, "KeyDetector::drop");
            }
        }
        tracing::info!("[KeyDetector] Destroyed");
    }
}

/// Cloneable read-only view of the displayed key
///
/// Keeps the shared buffers alive but not the analysis thread; after the
/// detector is dropped it keeps returning the last displayed key.
#[derive(Clone)]
pub struct KeyReader {
    context: Arc<AnalysisContext>,
}

impl KeyReader {
    pub fn current_key(&self) -> Option<Key> {
        self.context.current_key()
    }

    pub fn current_key_display(&self) -> &'static str {
        self.current_key()
            .map(Key::display_name)
            .unwrap_or(NO_KEY_DISPLAY)
    }
}
