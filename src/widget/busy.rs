//! Two-state busy latch guarding sends and uploads.

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether a send or upload is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyState {
    Idle,
    Busy,
}

#[derive(Debug, Default)]
pub(crate) struct BusyLatch {
    busy: AtomicBool,
}

impl BusyLatch {
    /// Move Idle -> Busy. `None` if already Busy.
    pub(crate) fn try_acquire(&self) -> Option<BusyToken<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyToken { latch: self })
    }

    pub(crate) fn state(&self) -> BusyState {
        if self.busy.load(Ordering::Acquire) {
            BusyState::Busy
        } else {
            BusyState::Idle
        }
    }
}

/// Holds the latch in Busy; returns it to Idle on drop.
#[derive(Debug)]
pub(crate) struct BusyToken<'a> {
    latch: &'a BusyLatch,
}

impl Drop for BusyToken<'_> {
    fn drop(&mut self) {
        self.latch.busy.store(false, Ordering::Release);
    }
}
