//! Forced-abort flags for deadlock victims.
//!
//! The deadlock monitor cannot unwind a blocked worker directly; it sets the
//! victim's flag and broadcasts every lock condition. The victim's wait loop
//! consumes the flag on wakeup and unwinds its transaction.

use mvkv_core::types::WorkerId;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// One forced-abort flag per worker.
///
/// Flags are consumed, not just read: one `set` forces exactly one abort.
/// A stale flag left by a worker that stopped waiting on its own is cleared
/// when the worker's session is torn down.
pub struct AbortFlags {
    flagged: Mutex<FxHashSet<WorkerId>>,
}

impl AbortFlags {
    /// Create with no worker flagged.
    pub fn new() -> Self {
        Self {
            flagged: Mutex::new(FxHashSet::default()),
        }
    }

    /// Mark `worker` for forced abort.
    pub fn set(&self, worker: WorkerId) {
        self.flagged.lock().insert(worker);
    }

    /// Consume `worker`'s flag, returning whether it was set.
    pub fn take(&self, worker: WorkerId) -> bool {
        self.flagged.lock().remove(&worker)
    }

    /// Peek at `worker`'s flag without consuming it.
    pub fn is_set(&self, worker: WorkerId) -> bool {
        self.flagged.lock().contains(&worker)
    }

    /// Drop `worker`'s flag if present.
    pub fn clear(&self, worker: WorkerId) {
        self.flagged.lock().remove(&worker);
    }
}

impl Default for AbortFlags {
    fn default() -> Self {
        Self::new()
    }
}
