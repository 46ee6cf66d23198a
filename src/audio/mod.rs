// Audio module - real-time half of the pipeline and the window handoff

pub mod handoff;
pub mod ingest;
pub mod window_pool;

// Re-export commonly used types for convenience
pub use handoff::{ClaimedWindow, PublishRefused, ReadyWindow, WindowSlot};
pub use ingest::DecimatingIngest;
pub use window_pool::{WindowPool, POOL_SIZE};
