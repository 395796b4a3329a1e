//! Multi-version storage over a fixed key space.
//!
//! Each key owns an append-only chain of committed versions, oldest first.
//! Readers scan a chain from the newest end for the first version stamped at
//! or below their snapshot timestamp, so a reader never observes a commit
//! newer than its snapshot and never blocks behind writers of other keys.

use mvkv_core::types::{KeyId, Timestamp, Version};
use parking_lot::Mutex;

// =============================================================================
// Version chain
// =============================================================================

/// Append-only version history for a single key.
///
/// Commit timestamps strictly increase along the chain. The last element is
/// the newest committed version (the head).
struct VersionChain<V> {
    versions: Vec<Version<V>>,
}

impl<V: Clone> VersionChain<V> {
    fn new() -> Self {
        Self {
            versions: Vec::new(),
        }
    }

    fn append(&mut self, value: V, commit_ts: Timestamp) {
        debug_assert!(
            self.versions
                .last()
                .map_or(true, |head| head.commit_ts < commit_ts),
            "commit timestamps must strictly increase along a chain"
        );
        self.versions.push(Version::new(value, commit_ts));
    }

    /// Newest version visible at `snapshot_ts`, scanning from the head.
    fn read_as_of(&self, snapshot_ts: Timestamp) -> Option<&Version<V>> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.commit_ts <= snapshot_ts)
    }

    fn head(&self) -> Option<&Version<V>> {
        self.versions.last()
    }

    fn len(&self) -> usize {
        self.versions.len()
    }
}

// =============================================================================
// Version store
// =============================================================================

/// Versioned storage for a fixed set of keys.
///
/// The key space is sized once at construction. Each chain is guarded by its
/// own mutex, so operations on different keys never contend; the mutex is
/// held only for the duration of one append or one chain scan.
///
/// # Thread Safety
///
/// All methods take `&self` and are safe to call from any number of threads.
/// A reader holding a snapshot timestamp sees a stable prefix of every chain:
/// versions are never mutated or removed once appended.
pub struct VersionStore<V> {
    chains: Box<[Mutex<VersionChain<V>>]>,
}

impl<V: Clone> VersionStore<V> {
    /// Create a store with `num_keys` empty chains.
    pub fn new(num_keys: usize) -> Self {
        let chains = (0..num_keys)
            .map(|_| Mutex::new(VersionChain::new()))
            .collect();
        Self { chains }
    }

    /// Size of the key space.
    pub fn num_keys(&self) -> usize {
        self.chains.len()
    }

    /// Install the initial version of `key` during store construction.
    ///
    /// Seeding happens before the store is shared, one version per key, all
    /// stamped with the same seed timestamp.
    pub fn seed(&self, key: KeyId, value: V, seed_ts: Timestamp) {
        self.chains[key].lock().append(value, seed_ts);
    }

    /// Append a committed version to `key`'s chain.
    ///
    /// Callers hold the key's commit lock, so appends to one chain are
    /// already serialized; the chain mutex only orders the append against
    /// concurrent readers of the same key.
    pub fn append(&self, key: KeyId, value: V, commit_ts: Timestamp) {
        self.chains[key].lock().append(value, commit_ts);
    }

    /// Value of the newest version of `key` stamped at or below
    /// `snapshot_ts`, or `None` if no version that old exists.
    ///
    /// For a seeded key, `None` can only mean the snapshot predates the seed
    /// timestamp; engine snapshots are always captured at or after seeding.
    pub fn read_as_of(&self, key: KeyId, snapshot_ts: Timestamp) -> Option<V> {
        self.chains[key]
            .lock()
            .read_as_of(snapshot_ts)
            .map(|v| v.value.clone())
    }

    /// Newest committed version of `key`, or `None` for an unseeded key.
    pub fn head(&self, key: KeyId) -> Option<Version<V>> {
        self.chains[key].lock().head().cloned()
    }

    /// Commit timestamp of the newest version of `key`.
    ///
    /// This is the value commit validation compares against a transaction's
    /// snapshot timestamp.
    pub fn head_timestamp(&self, key: KeyId) -> Option<Timestamp> {
        self.chains[key].lock().head().map(|v| v.commit_ts)
    }

    /// Number of versions in `key`'s chain.
    pub fn version_count(&self, key: KeyId) -> usize {
        self.chains[key].lock().len()
    }
}
