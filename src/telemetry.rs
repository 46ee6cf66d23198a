//! Per-instance pipeline counters.
//!
//! Both threads bump these with relaxed atomic increments, which is the only
//! bookkeeping the audio thread is allowed to do. Readers take a snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of the pipeline counters for logging/CLI reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    /// Windows handed to the analysis thread
    pub windows_published: u64,
    /// Completed windows discarded because the consumer was still busy
    pub windows_dropped: u64,
    /// Windows the classifier ran on
    pub windows_classified: u64,
    /// Classifier results reported as silence
    pub silent_windows: u64,
    /// Windows or results discarded after a window resize
    pub stale_windows: u64,
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    windows_published: AtomicU64,
    windows_dropped: AtomicU64,
    windows_classified: AtomicU64,
    silent_windows: AtomicU64,
    stale_windows: AtomicU64,
}

impl PipelineStats {
    pub fn record_published(&self) {
        self.windows_published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.windows_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_classified(&self) {
        self.windows_classified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_silent(&self) {
        self.silent_windows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stale(&self) {
        self.stale_windows.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            windows_published: self.windows_published.load(Ordering::Relaxed),
            windows_dropped: self.windows_dropped.load(Ordering::Relaxed),
            windows_classified: self.windows_classified.load(Ordering::Relaxed),
            silent_windows: self.silent_windows.load(Ordering::Relaxed),
            stale_windows: self.stale_windows.load(Ordering::Relaxed),
        }
    }
}
