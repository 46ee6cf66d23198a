// WindowSlot - single-slot lock-free mailbox between the audio thread and the
// analysis thread
//
// Depth is exactly one and a full slot is never overwritten or queued behind:
// when the producer completes a window while the slot is still occupied, the
// new window is dropped and the producer keeps going. Recency matters more
// than completeness for a continuously updating key estimate.
//
// Protocol:
// - Publish (producer): one release store of the packed {index, len,
//   generation} word, then the active index flips to the other buffer.
// - Claim (consumer): acquire load, record a lease on the buffer, then an
//   acq-rel compare-exchange back to empty. The slot is free again before
//   classification starts, so the producer can publish the next window
//   while the consumer is still busy.
// - Lease release (consumer): release store when the ClaimedWindow drops.
//   The producer treats a leased next-buffer like an occupied slot.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::window_pool::WindowPool;

const EMPTY: u64 = 0;
const NO_LEASE: usize = usize::MAX;
const INDEX_MASK: u64 = 0b11;
const LEN_BITS: u32 = 30;
const LEN_MASK: u64 = (1 << LEN_BITS) - 1;

/// A completed window waiting in (or taken from) the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyWindow {
    /// Buffer index in the pool (0 or 1)
    pub index: usize,
    /// Number of valid samples
    pub len: usize,
    /// Configuration generation the window was recorded under
    pub generation: u32,
}

impl ReadyWindow {
    fn pack(self) -> u64 {
        debug_assert!(self.index < 2);
        debug_assert!((self.len as u64) <= LEN_MASK);
        ((self.generation as u64) << 32) | ((self.len as u64 & LEN_MASK) << 2) | (self.index as u64 + 1)
    }

    fn unpack(word: u64) -> Option<Self> {
        match word & INDEX_MASK {
            0 => None,
            tag => Some(Self {
                index: (tag - 1) as usize,
                len: ((word >> 2) & LEN_MASK) as usize,
                generation: (word >> 32) as u32,
            }),
        }
    }
}

/// Why the producer could not hand a completed window over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishRefused {
    /// The previous window has not been claimed yet
    SlotOccupied,
    /// The consumer is still reading the buffer the producer would switch to
    NextBufferLeased,
}

/// Single-slot mailbox plus the buffer ownership flags
pub struct WindowSlot {
    ready: AtomicU64,
    active: AtomicUsize,
    lease: AtomicUsize,
}

impl WindowSlot {
    pub fn new() -> Self {
        Self {
            ready: AtomicU64::new(EMPTY),
            active: AtomicUsize::new(0),
            lease: AtomicUsize::new(NO_LEASE),
        }
    }

    /// Hand the active buffer to the consumer and switch to the other one.
    ///
    /// Producer only. Never blocks; on refusal the caller keeps its buffer.
    ///
    /// # Returns
    /// The new active buffer index on success.
    pub fn try_publish(&self, window: ReadyWindow) -> Result<usize, PublishRefused> {
        if self.ready.load(Ordering::Acquire) != EMPTY {
            return Err(PublishRefused::SlotOccupied);
        }
        let next = 1 - window.index;
        if self.lease.load(Ordering::Acquire) == next {
            return Err(PublishRefused::NextBufferLeased);
        }

        self.ready.store(window.pack(), Ordering::Release);
        self.active.store(next, Ordering::Relaxed);
        Ok(next)
    }

    /// Take the pending window, leasing its buffer until the guard drops.
    ///
    /// Consumer only.
    pub fn claim<'a>(&'a self, pool: &'a WindowPool) -> Option<ClaimedWindow<'a>> {
        let word = self.ready.load(Ordering::Acquire);
        let window = ReadyWindow::unpack(word)?;

        self.lease.store(window.index, Ordering::Relaxed);
        match self
            .ready
            .compare_exchange(word, EMPTY, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(ClaimedWindow {
                slot: self,
                pool,
                window,
            }),
            Err(_) => {
                // Cleared by a reconfiguration between load and exchange
                self.release_lease();
                None
            }
        }
    }

    /// Drop any pending window.
    ///
    /// # Returns
    /// `true` if a window was discarded.
    pub fn clear(&self) -> bool {
        self.ready.swap(EMPTY, Ordering::AcqRel) != EMPTY
    }

    /// Pending window, if any, without claiming it
    pub fn peek(&self) -> Option<ReadyWindow> {
        ReadyWindow::unpack(self.ready.load(Ordering::Acquire))
    }

    pub fn is_occupied(&self) -> bool {
        self.ready.load(Ordering::Acquire) != EMPTY
    }

    /// Buffer the producer is currently writing
    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Buffer the consumer is currently reading, if any
    pub fn leased_index(&self) -> Option<usize> {
        match self.lease.load(Ordering::Acquire) {
            NO_LEASE => None,
            index => Some(index),
        }
    }

    fn release_lease(&self) {
        self.lease.store(NO_LEASE, Ordering::Release);
    }
}

impl Default for WindowSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// A claimed window; the buffer stays leased while this guard lives
pub struct ClaimedWindow<'a> {
    slot: &'a WindowSlot,
    pool: &'a WindowPool,
    window: ReadyWindow,
}

impl ClaimedWindow<'_> {
    pub fn index(&self) -> usize {
        self.window.index
    }

    pub fn len(&self) -> usize {
        self.window.len
    }

    pub fn is_empty(&self) -> bool {
        self.window.len == 0
    }

    pub fn generation(&self) -> u32 {
        self.window.generation
    }

    /// Window samples, valid while the lease is held
    pub fn samples(&self) -> &[f32] {
        // SAFETY: this guard holds the lease on `window.index`, and the
        // producer never activates a leased buffer.
        unsafe { self.pool.read(self.window.index, self.window.len) }
    }
}

impl Drop for ClaimedWindow<'_> {
    fn drop(&mut self) {
        self.slot.release_lease();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(index: usize, len: usize, generation: u32) -> ReadyWindow {
        ReadyWindow {
            index,
            len,
            generation,
        }
    }

    #[test]
    fn test_pack_preserves_fields() {
        let ready = window(1, 88_200, 0xDEAD_BEEF);
        assert_eq!(ReadyWindow::unpack(ready.pack()), Some(ready));
        assert_eq!(ReadyWindow::unpack(EMPTY), None);
    }

    #[test]
    fn test_publish_then_claim() {
        let pool = WindowPool::new(16).unwrap();
        let slot = WindowSlot::new();
        assert_eq!(slot.active_index(), 0);

        assert_eq!(slot.try_publish(window(0, 16, 0)), Ok(1));
        assert_eq!(slot.active_index(), 1);
        assert!(slot.is_occupied());

        let claimed = slot.claim(&pool).expect("window should be ready");
        assert_eq!(claimed.index(), 0);
        assert_eq!(claimed.len(), 16);
        assert_eq!(claimed.samples().len(), 16);
        assert!(!slot.is_occupied(), "slot is freed before classification");
        assert_eq!(slot.leased_index(), Some(0));

        drop(claimed);
        assert_eq!(slot.leased_index(), None);
    }

    #[test]
    fn test_occupied_slot_refuses_publish() {
        let slot = WindowSlot::new();
        slot.try_publish(window(0, 8, 0)).unwrap();

        assert_eq!(
            slot.try_publish(window(1, 8, 0)),
            Err(PublishRefused::SlotOccupied)
        );
        assert_eq!(slot.active_index(), 1, "refusal must not switch buffers");
        assert_eq!(slot.peek(), Some(window(0, 8, 0)));
    }

    #[test]
    fn test_leased_buffer_is_never_activated() {
        let pool = WindowPool::new(8).unwrap();
        let slot = WindowSlot::new();

        slot.try_publish(window(0, 8, 0)).unwrap();
        let claimed = slot.claim(&pool).unwrap();

        // Producer finished buffer 1 while buffer 0 is still being read
        assert_eq!(
            slot.try_publish(window(1, 8, 0)),
            Err(PublishRefused::NextBufferLeased)
        );
        assert_eq!(slot.active_index(), 1);

        drop(claimed);
        assert_eq!(slot.try_publish(window(1, 8, 0)), Ok(0));
    }

    #[test]
    fn test_claim_on_empty_slot() {
        let pool = WindowPool::new(8).unwrap();
        let slot = WindowSlot::new();
        assert!(slot.claim(&pool).is_none());
        assert_eq!(slot.leased_index(), None);
    }

    #[test]
    fn test_clear_discards_pending_window() {
        let pool = WindowPool::new(8).unwrap();
        let slot = WindowSlot::new();
        assert!(!slot.clear());

        slot.try_publish(window(0, 8, 3)).unwrap();
        assert!(slot.clear());
        assert!(slot.claim(&pool).is_none());
    }
}
