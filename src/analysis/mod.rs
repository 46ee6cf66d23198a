// Analysis module - background key estimation
//
// This module owns everything that runs on the analysis thread: claiming
// completed windows from the handoff slot, running the key classifier, and
// folding results into the decaying vote tally that drives the displayed key.
//
// Architecture:
// - AnalysisWorker: loop that claims windows from the WindowSlot
// - Pipeline: ClaimedWindow → KeyClassifier → VoteTally → displayed key
// - Output: KeyUpdate sent via tokio broadcast channel to subscribers

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thread_priority::{set_current_thread_priority, ThreadPriority};
use tokio::sync::broadcast;

use crate::audio::handoff::ClaimedWindow;
use crate::config::DetectorConfig;
use crate::context::AnalysisContext;

pub mod chroma;
pub mod classifier;
pub mod fft;
pub mod key;
pub mod votes;

use classifier::KeyClassifier;
use key::Key;
use votes::VoteTally;

/// Name given to the analysis thread
pub const ANALYSIS_THREAD_NAME: &str = "keydetect-analysis";

/// One accepted vote, pushed to subscribers
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct KeyUpdate {
    /// Classifier output for this window
    pub raw: Key,
    /// Tally leader after the vote
    pub displayed: Key,
    /// Leader score as a share of all scores (0.0-1.0)
    pub confidence: f32,
    /// Configuration generation the window was recorded under
    pub generation: u32,
    /// Sequence number of the classified window on this worker
    pub window_index: u64,
}

/// Worker tuning taken from [`DetectorConfig`]
#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    /// Park duration when the slot is empty
    pub poll_interval: Duration,
    pub vote_decay: f32,
    /// Drop to the lowest scheduling priority on start
    pub lower_priority: bool,
}

impl From<&DetectorConfig> for WorkerSettings {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            vote_decay: config.effective_vote_decay(),
            lower_priority: config.lower_worker_priority,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from(&DetectorConfig::default())
    }
}

/// Consumer side of the pipeline; owns the classifier and the vote tally.
pub struct AnalysisWorker {
    context: Arc<AnalysisContext>,
    classifier: Box<dyn KeyClassifier>,
    tally: VoteTally,
    /// Generation the tally's scores belong to
    tally_generation: u32,
    shutdown: Arc<AtomicBool>,
    settings: WorkerSettings,
    update_sender: broadcast::Sender<KeyUpdate>,
    windows_seen: u64,
}

impl AnalysisWorker {
    /// Create a worker bound to a context
    ///
    /// # Arguments
    /// * `context` - Shared pipeline state (also held by the detector handle)
    /// * `classifier` - Key estimator, moved onto the analysis thread
    /// * `shutdown` - Set to `true` to stop the loop
    /// * `settings` - Poll interval, vote decay and priority handling
    /// * `update_sender` - Broadcast channel for accepted votes
    pub fn new(
        context: Arc<AnalysisContext>,
        classifier: Box<dyn KeyClassifier>,
        shutdown: Arc<AtomicBool>,
        settings: WorkerSettings,
        update_sender: broadcast::Sender<KeyUpdate>,
    ) -> Self {
        let tally_generation = context.generation();
        Self {
            context,
            classifier,
            tally: VoteTally::new(settings.vote_decay),
            tally_generation,
            shutdown,
            settings,
            update_sender,
            windows_seen: 0,
        }
    }

    /// Run until the shutdown flag is set.
    pub fn run(mut self) {
        if self.settings.lower_priority {
            if let Err(e) = set_current_thread_priority(ThreadPriority::Min) {
                tracing::warn!("[AnalysisThread] Could not lower thread priority: {:?}", e);
            }
        }

        tracing::info!(
            "[AnalysisThread] Starting analysis loop (rate={} Hz, poll={:?})",
            self.context.decimated_rate(),
            self.settings.poll_interval
        );

        while !self.shutdown.load(Ordering::Acquire) {
            if !self.poll_once() {
                // Woken early by unpark() on shutdown
                thread::park_timeout(self.settings.poll_interval);
            }
        }

        let stats = self.context.stats().snapshot();
        tracing::info!(
            "[AnalysisThread] Shutdown flag set, exiting (classified={}, dropped={}, stale={})",
            stats.windows_classified,
            stats.windows_dropped,
            stats.stale_windows
        );
    }

    /// Process the pending window, if any.
    ///
    /// # Returns
    /// `true` if a window was claimed.
    pub fn poll_once(&mut self) -> bool {
        let context = Arc::clone(&self.context);
        let Some(window) = context.claim() else {
            return false;
        };
        self.process_window(window);
        true
    }

    /// Classify one window and vote on the result.
    ///
    /// The lease is held until bookkeeping is done, so an idle slot with no
    /// lease means every published window is fully accounted for.
    fn process_window(&mut self, window: ClaimedWindow<'_>) {
        let generation = window.generation();
        let stats = self.context.stats();

        if generation != self.context.generation() {
            tracing::debug!(
                "[AnalysisThread] Skipping window from generation {} (current {})",
                generation,
                self.context.generation()
            );
            stats.record_stale();
            return;
        }

        if generation != self.tally_generation {
            self.tally.reset();
            self.tally_generation = generation;
        }

        let classification = self
            .classifier
            .classify(window.samples(), self.context.decimated_rate());
        let window_len = window.len();

        self.windows_seen += 1;
        stats.record_classified();

        let Some(raw) = classification.key() else {
            stats.record_silent();
            tracing::trace!("[AnalysisThread] Window {} silent", self.windows_seen);
            return;
        };

        // Window resized while the classifier was running
        if self.context.generation() != generation {
            stats.record_stale();
            return;
        }

        let displayed = self.tally.cast(raw);
        self.context.publish_key(generation, displayed);

        let update = KeyUpdate {
            raw,
            displayed,
            confidence: self.tally.confidence(),
            generation,
            window_index: self.windows_seen,
        };
        tracing::debug!(
            "[AnalysisThread] Window {} ({} samples): raw={} displayed={} confidence={:.2}",
            update.window_index,
            window_len,
            raw,
            displayed,
            update.confidence
        );

        // No subscribers is not an error
        let _ = self.update_sender.send(update);
    }

    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }
}

/// Spawn the analysis thread
///
/// # Arguments
/// * `context` - Shared pipeline state
/// * `classifier` - Key estimator, moved onto the new thread
/// * `shutdown` - Stop flag; set it, then `unpark()` the thread and join
/// * `settings` - Worker tuning
/// * `update_sender` - Broadcast channel for accepted votes
///
/// # Returns
/// The join handle, or the OS error if the thread could not be created
pub fn spawn_analysis_thread(
    context: Arc<AnalysisContext>,
    classifier: Box<dyn KeyClassifier>,
    shutdown: Arc<AtomicBool>,
    settings: WorkerSettings,
    update_sender: broadcast::Sender<KeyUpdate>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(ANALYSIS_THREAD_NAME.to_string())
        .spawn(move || {
            let worker =
                AnalysisWorker::new(context, classifier, shutdown, settings, update_sender);
            worker.run();
        })
}
