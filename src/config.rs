//! Configuration management for the key detector
//!
//! Runtime parameters are loaded from a JSON file so the analysis cadence
//! and vote decay can be tuned without recompiling. Structural limits that
//! size the pre-allocated buffers are compile-time constants.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Decimation factor applied before analysis (every Nth mono sample is kept)
pub const DECIMATION: usize = 4;

/// Shortest supported analysis window in seconds
pub const MIN_WINDOW_SECONDS: f32 = 1.0;
/// Longest supported analysis window in seconds
pub const MAX_WINDOW_SECONDS: f32 = 8.0;
/// Window length used when nothing else is configured
pub const DEFAULT_WINDOW_SECONDS: f32 = 2.0;
/// Step advertised to hosts for the window control
pub const WINDOW_STEP_SECONDS: f32 = 0.5;

/// Extra samples reserved past the longest window
pub const BUFFER_HEADROOM: usize = 128;

/// Sample rates accepted by [`crate::KeyDetector::new`]
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Retention factor applied to every vote before a new one is cast
pub const DEFAULT_VOTE_DECAY: f32 = 0.6;

/// Clamp a requested window length to the supported range.
///
/// NaN maps to the default window.
pub fn clamp_window_seconds(seconds: f32) -> f32 {
    if seconds.is_nan() {
        return DEFAULT_WINDOW_SECONDS;
    }
    seconds.clamp(MIN_WINDOW_SECONDS, MAX_WINDOW_SECONDS)
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detector: DetectorConfig,
    pub audio: AudioConfig,
}

/// Analysis pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Initial analysis window in seconds (clamped on use)
    pub window_seconds: f32,
    /// Vote retention factor, must be in (0, 1)
    pub vote_decay: f32,
    /// How long the analysis thread parks when no window is ready
    pub poll_interval_ms: u64,
    /// Drop the analysis thread to the lowest scheduling priority
    pub lower_worker_priority: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_WINDOW_SECONDS,
            vote_decay: DEFAULT_VOTE_DECAY,
            poll_interval_ms: 50,
            lower_worker_priority: true,
        }
    }
}

impl DetectorConfig {
    /// Vote decay with out-of-range values replaced by the default
    pub fn effective_vote_decay(&self) -> f32 {
        if self.vote_decay > 0.0 && self.vote_decay < 1.0 {
            self.vote_decay
        } else {
            log::warn!(
                "[Config] vote_decay {} outside (0, 1), using {}",
                self.vote_decay,
                DEFAULT_VOTE_DECAY
            );
            DEFAULT_VOTE_DECAY
        }
    }
}

/// Stream parameters used by the CLI driver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Frames per simulated audio callback
    pub block_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_frames: 128,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

/// State persisted by the host between sessions: only the window length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorState {
    pub window: f32,
}

impl DetectorState {
    /// Window length if it lies inside the supported range.
    ///
    /// Restored state is ignored rather than clamped when out of range.
    pub fn valid_window(&self) -> Option<f32> {
        (MIN_WINDOW_SECONDS..=MAX_WINDOW_SECONDS)
            .contains(&self.window)
            .then_some(self.window)
    }
}
