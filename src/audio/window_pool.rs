// WindowPool - two pre-allocated analysis buffers shared by the audio and
// analysis threads
//
// The pool itself does no synchronisation. Which thread may touch which
// buffer is decided by the WindowSlot protocol in handoff.rs:
// - the audio thread writes only the active buffer
// - the analysis thread reads only the buffer it holds a lease on
// - the audio thread never makes a leased buffer active
//
// All heap allocation happens in `WindowPool::new`; neither thread allocates
// afterwards.

use std::cell::UnsafeCell;

use crate::error::KeyDetectError;

/// Number of buffers in the ping-pong pool
pub const POOL_SIZE: usize = 2;

type Buffer = Box<[UnsafeCell<f32>]>;

/// Fixed-capacity ping-pong sample buffers
pub struct WindowPool {
    buffers: [Buffer; POOL_SIZE],
    capacity: usize,
}

// SAFETY: every buffer is accessed by at most one thread at a time. The
// producer writes only the buffer published as active, the consumer reads
// only a buffer it leased through `WindowSlot::claim`, and the producer
// refuses to activate a leased buffer. Publication and lease release use
// release/acquire pairs, so writes are visible before a read begins and
// reads finish before the next write to the same buffer.
unsafe impl Sync for WindowPool {}

impl WindowPool {
    /// Allocate both buffers
    ///
    /// # Arguments
    /// * `capacity` - Samples per buffer (longest window plus headroom)
    ///
    /// # Errors
    /// `BufferAllocationFailed` if the memory cannot be reserved.
    pub fn new(capacity: usize) -> Result<Self, KeyDetectError> {
        Ok(Self {
            buffers: [allocate(capacity)?, allocate(capacity)?],
            capacity,
        })
    }

    /// Samples per buffer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Store one sample into a buffer.
    ///
    /// # Safety
    /// The caller must be the single producer and `index` must be the active
    /// buffer, which is never leased to the consumer.
    #[inline]
    pub(crate) unsafe fn write(&self, index: usize, position: usize, sample: f32) {
        *self.buffers[index][position].get() = sample;
    }

    /// View the first `len` samples of a buffer.
    ///
    /// # Safety
    /// The caller must hold the consumer lease on `index` for as long as the
    /// returned slice is alive.
    pub(crate) unsafe fn read(&self, index: usize, len: usize) -> &[f32] {
        let cells = &self.buffers[index][..len.min(self.capacity)];
        // UnsafeCell<f32> has the same layout as f32.
        std::slice::from_raw_parts(cells.as_ptr() as *const f32, cells.len())
    }
}

fn allocate(capacity: usize) -> Result<Buffer, KeyDetectError> {
    let mut buffer: Vec<UnsafeCell<f32>> = Vec::new();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|_| KeyDetectError::BufferAllocationFailed { samples: capacity })?;
    buffer.extend((0..capacity).map(|_| UnsafeCell::new(0.0)));
    Ok(buffer.into_boxed_slice())
}
