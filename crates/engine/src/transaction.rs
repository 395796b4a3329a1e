//! The transaction protocol.
//!
//! A transaction buffers writes locally and publishes them all-or-nothing at
//! commit. Commit locks the written keys in ascending key order (the primary
//! deadlock-avoidance discipline), validates that no newer version landed
//! after the snapshot, and only then mints a commit timestamp and appends
//! one version per key. Locks are released in reverse acquisition order on
//! every exit path, including drop without commit.

use crate::store::StoreInner;
use mvkv_core::error::{Error, Result};
use mvkv_core::types::{KeyId, Timestamp};
use mvkv_core::WorkerId;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::atomic::Ordering;

/// A single in-flight transaction on one session.
///
/// Reads see the store as of the snapshot captured at begin, plus this
/// transaction's own buffered writes. Nothing is visible to other
/// transactions before [`commit`](Transaction::commit) returns `Ok`.
///
/// `commit` and [`abort`](Transaction::abort) consume the transaction, so
/// the committed and aborted states are terminal by construction. Dropping a
/// live transaction aborts it.
pub struct Transaction<'a, V> {
    store: &'a StoreInner<V>,
    worker: WorkerId,
    start_ts: Timestamp,
    writes: FxHashMap<KeyId, V>,
    held: SmallVec<[KeyId; 8]>,
    aborted: bool,
}

impl<'a, V: Clone> Transaction<'a, V> {
    pub(crate) fn new(store: &'a StoreInner<V>, worker: WorkerId, start_ts: Timestamp) -> Self {
        Self {
            store,
            worker,
            start_ts,
            writes: FxHashMap::default(),
            held: SmallVec::new(),
            aborted: false,
        }
    }

    /// Snapshot timestamp this transaction reads at.
    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    /// Number of distinct keys buffered for commit.
    pub fn write_set_len(&self) -> usize {
        self.writes.len()
    }

    /// Read `key` as of this transaction's snapshot.
    ///
    /// A key written earlier in the same transaction returns the buffered
    /// value (read-your-own-writes); otherwise the newest version committed
    /// at or before the snapshot is returned.
    ///
    /// # Errors
    ///
    /// [`Error::KeyOutOfRange`] for a key outside the store's key space;
    /// [`Error::KeyUninitialized`] if the key was never seeded. Both reflect
    /// setup bugs, not transaction outcomes.
    pub fn read(&self, key: KeyId) -> Result<V> {
        self.check_range(key)?;
        if let Some(value) = self.writes.get(&key) {
            return Ok(value.clone());
        }
        self.store
            .versions
            .read_as_of(key, self.start_ts)
            .ok_or(Error::KeyUninitialized { key })
    }

    /// Buffer a write of `value` to `key`.
    ///
    /// Writing a key twice replaces the buffered value; only the last write
    /// per key is published.
    ///
    /// # Errors
    ///
    /// [`Error::WriteSetFull`] when a new distinct key would exceed the
    /// store's write-set capacity. The transaction is marked aborted: the
    /// buffer no longer reflects the caller's intent, so a partial commit
    /// must be impossible.
    pub fn write(&mut self, key: KeyId, value: V) -> Result<()> {
        self.check_range(key)?;
        let capacity = self.store.write_set_capacity;
        if !self.writes.contains_key(&key) && self.writes.len() >= capacity {
            self.aborted = true;
            return Err(Error::WriteSetFull { capacity });
        }
        self.writes.insert(key, value);
        Ok(())
    }

    /// Attempt to publish the write-set, returning the commit timestamp.
    ///
    /// The commit sequence: sort written keys ascending, lock each in that
    /// order, validate every written key's head against the snapshot, then
    /// mint a timestamp and append all versions under the store's commit
    /// lock. Locks are released in reverse acquisition order whether the
    /// commit succeeds or fails.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyAborted`] if the transaction was marked aborted.
    /// - [`Error::LockAborted`] if the deadlock monitor cancelled a blocked
    ///   lock wait; nothing was published.
    /// - [`Error::ValidationConflict`] if another transaction committed a
    ///   written key after this snapshot; nothing was published. Retrying
    ///   the whole transaction on a fresh snapshot is safe.
    pub fn commit(mut self) -> Result<Timestamp> {
        if self.aborted {
            self.release_locks();
            return Err(Error::AlreadyAborted);
        }

        let mut keys: Vec<KeyId> = self.writes.keys().copied().collect();
        keys.sort_unstable();

        for &key in &keys {
            match self.store.locks.acquire(key, self.worker) {
                Ok(()) => self.held.push(key),
                Err(err) => {
                    self.store.lock_aborts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        worker = self.worker,
                        key,
                        "commit unwound: lock wait cancelled"
                    );
                    self.release_locks();
                    return Err(err);
                }
            }
        }

        // All written keys are locked: their heads cannot move under us.
        for &key in &keys {
            if let Some(committed_ts) = self.store.versions.head_timestamp(key) {
                if committed_ts > self.start_ts {
                    self.store.conflicts.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        worker = self.worker,
                        key,
                        committed_ts,
                        snapshot_ts = self.start_ts,
                        "commit rejected: newer version past snapshot"
                    );
                    self.release_locks();
                    return Err(Error::ValidationConflict {
                        key,
                        committed_ts,
                        snapshot_ts: self.start_ts,
                    });
                }
            }
        }

        let commit_ts = {
            let _publish = self.store.commit_lock.lock();
            let commit_ts = self.store.clock.tick();
            for &key in &keys {
                if let Some(value) = self.writes.remove(&key) {
                    self.store.versions.append(key, value, commit_ts);
                }
            }
            commit_ts
        };

        self.store.committed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(worker = self.worker, commit_ts, "transaction committed");
        self.release_locks();
        Ok(commit_ts)
    }

    /// Abort the transaction, discarding all buffered writes.
    ///
    /// Idempotent with respect to the state machine: an already-aborted
    /// transaction aborts the same way. Dropping the transaction has the
    /// same effect.
    pub fn abort(mut self) {
        self.writes.clear();
        self.aborted = true;
        self.release_locks();
        tracing::trace!(worker = self.worker, "transaction aborted");
    }

    fn check_range(&self, key: KeyId) -> Result<()> {
        let num_keys = self.store.versions.num_keys();
        if key >= num_keys {
            return Err(Error::KeyOutOfRange { key, num_keys });
        }
        Ok(())
    }

    fn release_locks(&mut self) {
        while let Some(key) = self.held.pop() {
            self.store.locks.release(key, self.worker);
        }
    }
}

impl<V> Drop for Transaction<'_, V> {
    fn drop(&mut self) {
        // Backstop for early returns and panics in caller code; commit and
        // abort leave the lock list empty.
        while let Some(key) = self.held.pop() {
            self.store.locks.release(key, self.worker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Store, StoreBuilder};

    fn counting_store() -> Store<i64> {
        Store::new((0..8).map(|k| 100 + k).collect())
    }

    #[test]
    fn test_read_committed_seed() {
        let store = counting_store();
        let mut session = store.register();
        let tx = session.begin();
        assert_eq!(tx.read(0).unwrap(), 100);
        assert_eq!(tx.read(7).unwrap(), 107);
    }

    #[test]
    fn test_read_your_own_writes() {
        let store = counting_store();
        let mut session = store.register();
        let mut tx = session.begin();
        tx.write(3, -1).unwrap();
        assert_eq!(tx.read(3).unwrap(), -1, "buffered write shadows the store");
        assert_eq!(tx.read(4).unwrap(), 104, "other keys are unaffected");
        tx.abort();

        let tx = session.begin();
        assert_eq!(tx.read(3).unwrap(), 103, "aborted write left no trace");
    }

    #[test]
    fn test_commit_publishes_all_writes() {
        let store = counting_store();
        let mut session = store.register();
        let mut tx = session.begin();
        tx.write(1, 11).unwrap();
        tx.write(5, 55).unwrap();
        let commit_ts = tx.commit().unwrap();

        assert!(commit_ts > 1, "commit ts postdates the seed");
        assert_eq!(store.latest(1).unwrap(), 11);
        assert_eq!(store.latest(5).unwrap(), 55);
        assert_eq!(store.stats().committed, 1);
    }

    #[test]
    fn test_snapshot_does_not_see_later_commit() {
        let store = counting_store();
        let mut reader = store.register();
        let mut writer = store.register();

        let old = reader.begin();
        let snapshot = old.start_ts();

        let mut tx = writer.begin();
        tx.write(0, 999).unwrap();
        let commit_ts = tx.commit().unwrap();
        assert!(commit_ts > snapshot);

        assert_eq!(old.read(0).unwrap(), 100, "snapshot predates the commit");
        drop(old);

        let fresh = reader.begin();
        assert_eq!(fresh.read(0).unwrap(), 999);
    }

    #[test]
    fn test_write_write_conflict_is_first_committer_wins() {
        let store = counting_store();
        let mut s1 = store.register();
        let mut s2 = store.register();

        let mut t1 = s1.begin();
        let mut t2 = s2.begin();
        let v1 = t1.read(2).unwrap();
        let v2 = t2.read(2).unwrap();
        t1.write(2, v1 + 1).unwrap();
        t2.write(2, v2 + 10).unwrap();

        t1.commit().unwrap();
        let err = t2.commit().unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.latest(2).unwrap(), 103, "the loser published nothing");
        assert_eq!(store.stats().conflicts, 1);
    }

    #[test]
    fn test_conflict_reports_timestamps() {
        let store = counting_store();
        let mut s1 = store.register();
        let mut s2 = store.register();

        let mut t2 = s2.begin();
        let snapshot = t2.start_ts();
        t2.write(0, 1).unwrap();

        let mut t1 = s1.begin();
        t1.write(0, 2).unwrap();
        let winner_ts = t1.commit().unwrap();

        assert_eq!(
            t2.commit(),
            Err(Error::ValidationConflict {
                key: 0,
                committed_ts: winner_ts,
                snapshot_ts: snapshot,
            })
        );
    }

    #[test]
    fn test_disjoint_write_sets_both_commit() {
        let store = counting_store();
        let mut s1 = store.register();
        let mut s2 = store.register();

        let mut t1 = s1.begin();
        let mut t2 = s2.begin();
        t1.write(0, 1).unwrap();
        t2.write(1, 2).unwrap();

        let ts1 = t1.commit().unwrap();
        let ts2 = t2.commit().unwrap();
        assert_ne!(ts1, ts2, "every commit mints its own timestamp");
        assert_eq!(store.latest(0).unwrap(), 1);
        assert_eq!(store.latest(1).unwrap(), 2);
    }

    #[test]
    fn test_empty_write_set_commits() {
        let store = counting_store();
        let mut session = store.register();
        let tx = session.begin();
        assert!(tx.commit().is_ok());
        assert_eq!(store.stats().committed, 1);
    }

    #[test]
    fn test_last_write_per_key_wins() {
        let store = counting_store();
        let mut session = store.register();
        let mut tx = session.begin();
        tx.write(0, 1).unwrap();
        tx.write(0, 2).unwrap();
        tx.write(0, 3).unwrap();
        assert_eq!(tx.write_set_len(), 1);
        tx.commit().unwrap();
        assert_eq!(store.latest(0).unwrap(), 3);
    }

    #[test]
    fn test_write_set_overflow_poisons_the_transaction() {
        let store = StoreBuilder::new().write_set_capacity(2).build(vec![0_i64; 8]);
        let mut session = store.register();

        let mut tx = session.begin();
        tx.write(0, 1).unwrap();
        tx.write(1, 1).unwrap();
        tx.write(0, 2).unwrap(); // rewrite of a buffered key still fits
        assert_eq!(tx.write(2, 1), Err(Error::WriteSetFull { capacity: 2 }));
        assert_eq!(tx.commit(), Err(Error::AlreadyAborted));

        assert_eq!(store.latest(0).unwrap(), 0, "nothing was published");
        assert_eq!(store.stats().committed, 0);
    }

    #[test]
    fn test_out_of_range_key_is_rejected() {
        let store = counting_store();
        let mut session = store.register();
        let mut tx = session.begin();
        assert_eq!(
            tx.read(8),
            Err(Error::KeyOutOfRange { key: 8, num_keys: 8 })
        );
        assert_eq!(
            tx.write(99, 0),
            Err(Error::KeyOutOfRange { key: 99, num_keys: 8 })
        );
        // The transaction itself is still usable.
        tx.write(0, 1).unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn test_commit_timestamps_strictly_increase() {
        let store = counting_store();
        let mut session = store.register();
        let mut last = 0;
        for round in 0..10 {
            let mut tx = session.begin();
            tx.write(round % 8, round as i64).unwrap();
            let ts = tx.commit().unwrap();
            assert!(ts > last);
            last = ts;
        }
    }

    #[test]
    fn test_drop_without_commit_publishes_nothing() {
        let store = counting_store();
        let mut session = store.register();
        {
            let mut tx = session.begin();
            tx.write(0, 999).unwrap();
        }
        assert_eq!(store.latest(0).unwrap(), 100);

        // The next transaction on the session works normally.
        let mut tx = session.begin();
        tx.write(0, 1).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.latest(0).unwrap(), 1);
    }
}
