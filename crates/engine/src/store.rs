//! Store context and worker sessions.
//!
//! The [`Store`] is the single context object holding everything shared
//! between transactions: the commit clock, the version chains, the per-key
//! lock table, the wait-for graph, the abort flags and the background
//! deadlock monitor. All of it is created together at store construction and
//! torn down together when the last handle drops; nothing lives in globals.

use crate::transaction::Transaction;
use mvkv_concurrency::{AbortFlags, DeadlockMonitor, LockManager, WaitForGraph};
use mvkv_core::error::{Error, Result};
use mvkv_core::types::{KeyId, WorkerId};
use mvkv_storage::{CommitClock, VersionStore};
use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default maximum number of distinct keys per transaction write-set.
pub const DEFAULT_WRITE_SET_CAPACITY: usize = 32;

/// Default deadlock monitor scan interval.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(100);

/// Everything shared by the sessions of one store.
pub(crate) struct StoreInner<V> {
    pub(crate) clock: CommitClock,
    pub(crate) versions: VersionStore<V>,
    pub(crate) locks: Arc<LockManager>,
    pub(crate) waits: Arc<WaitForGraph>,
    pub(crate) aborts: Arc<AbortFlags>,

    /// Serializes commit publication ({tick, append-all}) against snapshot
    /// capture, so no transaction ever begins inside a half-published
    /// commit. Reads, lock waits and validation never take this.
    pub(crate) commit_lock: Mutex<()>,

    pub(crate) write_set_capacity: usize,
    next_worker: AtomicUsize,

    pub(crate) committed: AtomicU64,
    pub(crate) conflicts: AtomicU64,
    pub(crate) lock_aborts: AtomicU64,

    monitor: DeadlockMonitor,
}

/// Counters describing a store's lifetime activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Transactions that committed successfully.
    pub committed: u64,
    /// Commits rejected by validation (first-committer-wins losses).
    pub conflicts: u64,
    /// Commits unwound because a blocked lock wait was cancelled.
    pub lock_aborts: u64,
    /// Victims flagged by the deadlock monitor.
    pub deadlock_victims: u64,
}

/// An in-memory multi-version store over a fixed key space.
///
/// Keys are indices `0..num_keys`, each seeded with an initial value at
/// construction. Values are read and written through [`Transaction`]s begun
/// on registered [`Session`]s; every committed write becomes a new immutable
/// version stamped by the store's commit clock.
///
/// The store is a cheap clonable handle. Dropping the last handle (and the
/// last session) stops the deadlock monitor and frees all versions.
///
/// # Example
///
/// ```
/// use mvkv_engine::Store;
///
/// # fn main() -> mvkv_core::Result<()> {
/// let store = Store::new(vec![10_i64, 20]);
/// let mut session = store.register();
///
/// let mut tx = session.begin();
/// let a = tx.read(0)?;
/// tx.write(1, a + 5)?;
/// tx.commit()?;
///
/// assert_eq!(store.latest(1)?, 15);
/// # Ok(())
/// # }
/// ```
pub struct Store<V> {
    inner: Arc<StoreInner<V>>,
}

impl<V> Clone for Store<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V: Clone + Send + Sync + 'static> Store<V> {
    /// Create a store with default settings, seeding key `k` with
    /// `initial[k]`. Use [`StoreBuilder`] to change settings.
    pub fn new(initial: Vec<V>) -> Self {
        StoreBuilder::new().build(initial)
    }

    /// Register a worker with this store.
    ///
    /// Each session gets a distinct [`WorkerId`], never reused for the
    /// lifetime of the store. A session runs at most one transaction at a
    /// time.
    pub fn register(&self) -> Session<V> {
        let worker = self.inner.next_worker.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(worker, "session registered");
        Session {
            inner: Arc::clone(&self.inner),
            worker,
        }
    }

    /// Size of the key space.
    pub fn num_keys(&self) -> usize {
        self.inner.versions.num_keys()
    }

    /// Newest committed value of `key`, outside any transaction.
    pub fn latest(&self, key: KeyId) -> Result<V> {
        let num_keys = self.num_keys();
        if key >= num_keys {
            return Err(Error::KeyOutOfRange { key, num_keys });
        }
        self.inner
            .versions
            .head(key)
            .map(|v| v.value)
            .ok_or(Error::KeyUninitialized { key })
    }

    /// Snapshot of the store's activity counters.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            committed: self.inner.committed.load(Ordering::Relaxed),
            conflicts: self.inner.conflicts.load(Ordering::Relaxed),
            lock_aborts: self.inner.lock_aborts.load(Ordering::Relaxed),
            deadlock_victims: self.inner.monitor.victim_count(),
        }
    }
}

impl<V: Clone + std::fmt::Debug> Store<V> {
    /// Human-readable diagnostic dump: every key's head version followed by
    /// the current wait-for graph.
    pub fn dump(&self) -> String {
        let mut out = String::from("store:");
        for key in 0..self.inner.versions.num_keys() {
            match self.inner.versions.head(key) {
                Some(head) => {
                    let _ = write!(
                        out,
                        "\n  key {key}: {:?} (ts {}, {} versions)",
                        head.value,
                        head.commit_ts,
                        self.inner.versions.version_count(key)
                    );
                }
                None => {
                    let _ = write!(out, "\n  key {key}: <unseeded>");
                }
            }
        }
        out.push('\n');
        out.push_str(&self.inner.waits.render());
        out
    }
}

/// Configuration for a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    write_set_capacity: usize,
    monitor_interval: Duration,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            write_set_capacity: DEFAULT_WRITE_SET_CAPACITY,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
        }
    }
}

impl StoreBuilder {
    /// Start from the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of distinct keys one transaction may write.
    pub fn write_set_capacity(mut self, capacity: usize) -> Self {
        self.write_set_capacity = capacity;
        self
    }

    /// How often the deadlock monitor scans the wait-for graph. Detection
    /// latency is bounded by this interval.
    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Build the store, seeding key `k` with `initial[k]` at the seed
    /// timestamp and starting the deadlock monitor.
    pub fn build<V: Clone + Send + Sync + 'static>(self, initial: Vec<V>) -> Store<V> {
        let num_keys = initial.len();
        let versions = VersionStore::new(num_keys);
        for (key, value) in initial.into_iter().enumerate() {
            versions.seed(key, value, CommitClock::SEED_TS);
        }

        let waits = Arc::new(WaitForGraph::new());
        let aborts = Arc::new(AbortFlags::new());
        let locks = Arc::new(LockManager::new(
            num_keys,
            Arc::clone(&waits),
            Arc::clone(&aborts),
        ));
        let monitor = DeadlockMonitor::spawn(
            self.monitor_interval,
            Arc::clone(&waits),
            Arc::clone(&locks),
            Arc::clone(&aborts),
        );

        tracing::debug!(
            num_keys,
            write_set_capacity = self.write_set_capacity,
            "store created"
        );

        Store {
            inner: Arc::new(StoreInner {
                clock: CommitClock::new(),
                versions,
                locks,
                waits,
                aborts,
                commit_lock: Mutex::new(()),
                write_set_capacity: self.write_set_capacity,
                next_worker: AtomicUsize::new(0),
                committed: AtomicU64::new(0),
                conflicts: AtomicU64::new(0),
                lock_aborts: AtomicU64::new(0),
                monitor,
            }),
        }
    }
}

/// A registered worker's handle into a store.
///
/// Sessions are `Send` and meant to be moved into worker threads. `begin`
/// takes `&mut self`, so a session can drive at most one transaction at a
/// time; the deadlock monitor relies on one in-flight transaction per
/// worker id.
pub struct Session<V> {
    inner: Arc<StoreInner<V>>,
    worker: WorkerId,
}

impl<V: Clone> Session<V> {
    /// This session's worker id.
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Begin a transaction at the current clock value.
    ///
    /// The snapshot is captured under the store's commit lock so it can
    /// never land inside another transaction's publication window.
    pub fn begin(&mut self) -> Transaction<'_, V> {
        let start_ts = {
            let _publish = self.inner.commit_lock.lock();
            self.inner.clock.now()
        };
        Transaction::new(&self.inner, self.worker, start_ts)
    }
}

impl<V> Drop for Session<V> {
    fn drop(&mut self) {
        // A victim flag set while this session was not blocked would
        // otherwise cancel the next worker's first wait on a reused slot.
        self.inner.aborts.clear(self.worker);
    }
}
