//! Single-flight gate for sync passes.

use std::sync::atomic::{AtomicBool, Ordering};

/// At most one sync pass may run at a time; a second request while one is
/// in flight is refused rather than queued.
#[derive(Debug, Default)]
pub struct SyncGate {
    busy: AtomicBool,
}

impl SyncGate {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Try to start a sync pass. Returns `None` while another permit is
    /// alive; the permit releases the gate when dropped.
    #[must_use]
    pub fn try_acquire(&self) -> Option<SyncPermit<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Some(SyncPermit { gate: self })
        } else {
            None
        }
    }

    /// Whether a sync pass currently holds the gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof that the holder is the only running sync pass.
#[derive(Debug)]
pub struct SyncPermit<'a> {
    gate: &'a SyncGate,
}

impl Drop for SyncPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
