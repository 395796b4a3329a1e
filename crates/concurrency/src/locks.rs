//! Per-key commit locks with wait-for tracking.
//!
//! One mutual-exclusion lock per key, owned by a worker, not a thread. A
//! blocked acquisition registers a wait-for edge towards the current owner
//! before sleeping and re-checks its abort flag after every wakeup, so the
//! deadlock monitor can cancel the wait by setting the flag and broadcasting.

use crate::{AbortFlags, WaitForGraph};
use mvkv_core::error::{Error, Result};
use mvkv_core::types::{KeyId, WorkerId};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// Owner slot and wait condition for one key.
#[derive(Default)]
struct LockSlot {
    owner: Mutex<Option<WorkerId>>,
    available: Condvar,
}

/// Per-key lock table shared by all sessions of a store.
///
/// Locks are granted to worker ids. Release wakes every waiter of the key;
/// grant order is decided by the wakeup race, not by arrival order, so no
/// fairness is guaranteed.
///
/// # Thread Safety
///
/// Each slot has its own mutex, held only across owner checks and handoffs.
/// Wait-for edges are added while the slot mutex is held; the graph mutex
/// nests inside the slot mutex and that order is fixed across the crate.
pub struct LockManager {
    slots: Box<[LockSlot]>,
    waits: Arc<WaitForGraph>,
    aborts: Arc<AbortFlags>,
}

impl LockManager {
    /// Create a lock table for `num_keys` keys.
    pub fn new(num_keys: usize, waits: Arc<WaitForGraph>, aborts: Arc<AbortFlags>) -> Self {
        let slots = (0..num_keys).map(|_| LockSlot::default()).collect();
        Self {
            slots,
            waits,
            aborts,
        }
    }

    /// Size of the key space this table covers.
    pub fn num_keys(&self) -> usize {
        self.slots.len()
    }

    /// Block until `key` is free or already owned by `worker`, then take it.
    ///
    /// Acquiring a key the worker already owns returns immediately. Each
    /// time the worker is about to sleep it records a wait-for edge towards
    /// the current owner; all its edges are cleared once it stops blocking,
    /// whether by acquiring the lock or by unwinding.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LockAborted`] when the worker's abort flag is
    /// observed after a wakeup: the deadlock monitor chose this worker as a
    /// victim. The lock was not acquired and the caller must abort the whole
    /// transaction.
    pub fn acquire(&self, key: KeyId, worker: WorkerId) -> Result<()> {
        let slot = &self.slots[key];
        let mut owner = slot.owner.lock();

        loop {
            match *owner {
                None => break,
                Some(current) if current == worker => break,
                Some(current) => {
                    self.waits.add_edge(worker, current);
                    slot.available.wait(&mut owner);
                    // Edges come down before the flag is consumed: once the
                    // flag is gone the monitor must no longer see a cycle
                    // through this worker, or it would flag it again.
                    self.waits.clear_waiter(worker);
                    if self.aborts.take(worker) {
                        tracing::debug!(worker, key, "lock wait cancelled by deadlock monitor");
                        return Err(Error::LockAborted { key, worker });
                    }
                }
            }
        }

        *owner = Some(worker);
        self.waits.clear_waiter(worker);
        Ok(())
    }

    /// Release `key` if `worker` owns it and wake all waiters.
    ///
    /// Releasing a key the worker does not own is a no-op, which makes
    /// unwind paths free to release unconditionally.
    pub fn release(&self, key: KeyId, worker: WorkerId) {
        let slot = &self.slots[key];
        let mut owner = slot.owner.lock();
        if *owner == Some(worker) {
            *owner = None;
            slot.available.notify_all();
        }
    }

    /// Broadcast every key's wait condition.
    ///
    /// Used by the deadlock monitor after flagging a victim: the victim may
    /// be asleep on any key, and waiters re-check their abort flag on every
    /// wakeup.
    pub fn wake_all(&self) {
        for slot in self.slots.iter() {
            let _owner = slot.owner.lock();
            slot.available.notify_all();
        }
    }

    /// Current owner of `key`, if any.
    pub fn owner(&self, key: KeyId) -> Option<WorkerId> {
        *self.slots[key].owner.lock()
    }
}
