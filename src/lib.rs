// KeyDetect Core - real-time musical key detection
// Lock-free audio-thread ingest with background key classification

// Module declarations
pub mod analysis;
pub mod audio;
pub mod config;
pub mod context;
pub mod detector;
pub mod error;
pub mod params;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::chroma::{ChromaClassifier, ChromaConfig};
pub use analysis::classifier::{Classification, KeyClassifier};
pub use analysis::key::{Key, KEY_COUNT, NO_KEY_DISPLAY};
pub use analysis::KeyUpdate;
pub use config::{AppConfig, AudioConfig, DetectorConfig};
pub use detector::{KeyDetector, KeyReader};
pub use error::{ErrorCode, KeyDetectError};
pub use telemetry::StatsSnapshot;

/// Install a `tracing` fmt subscriber (honours `RUST_LOG`)
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
