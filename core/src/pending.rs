//! Pending operation counters.
//!
//! Anything that must finish before the system can shut down or hand over
//! control (a lease release, a final ACK) holds a count here. The scheduler's
//! `pending_wait()` drives passes until the total drops back to zero.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

/// System-wide count of outstanding operations.
#[derive(Debug, Clone, Default)]
pub struct PendingOperations {
    count: Arc<AtomicUsize>,
}

impl PendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one more operation outstanding.
    pub fn get(&self) {
        let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
        log::trace!("[PENDING] get, {} outstanding", count);
    }

    /// Mark one operation complete.
    ///
    /// # Panics
    ///
    /// If nothing is outstanding.
    pub fn put(&self) {
        let prev = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        assert!(prev.is_ok(), "pending operation released without a matching get");
        log::trace!("[PENDING] put, {} outstanding", self.count());
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_idle(&self) -> bool {
        self.count() == 0
    }
}

/// Count held by one operation against the shared total.
///
/// Whatever is still held on drop is released.
#[derive(Debug)]
pub struct PendingOperation {
    total: PendingOperations,
    held: AtomicUsize,
}

impl PendingOperation {
    pub fn new(total: &PendingOperations) -> Self {
        Self {
            total: total.clone(),
            held: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) {
        self.held.fetch_add(1, Ordering::AcqRel);
        self.total.get();
    }

    /// # Panics
    ///
    /// If this operation holds nothing.
    pub fn put(&self) {
        let prev = self
            .held
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1));
        assert!(prev.is_ok(), "pending operation released more often than taken");
        self.total.put();
    }

    /// Release everything this operation holds.
    pub fn clear(&self) {
        let held = self.held.swap(0, Ordering::AcqRel);
        for _ in 0..held {
            self.total.put();
        }
    }

    /// Counts currently held by this operation.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::Acquire)
    }

    pub fn is_pending(&self) -> bool {
        self.held() > 0
    }
}

impl Drop for PendingOperation {
    fn drop(&mut self) {
        if self.is_pending() {
            log::debug!("[PENDING] dropping operation with {} held", self.held());
            self.clear();
        }
    }
}
