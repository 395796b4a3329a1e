//! Unified error types for mvkv.
//!
//! Every fallible operation in the store returns [`enum@Error`]. The taxonomy
//! separates transaction outcomes a caller is expected to handle (conflicts,
//! forced deadlock aborts) from setup and usage bugs (bad key, unseeded
//! store), so retry loops can branch on [`Error::is_retryable`] alone.

use crate::types::{KeyId, Timestamp, WorkerId};
use thiserror::Error;

/// All mvkv errors.
///
/// This is the canonical error type for all store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Key index is outside the store's fixed key space.
    #[error("key {key} out of range: store holds {num_keys} keys")]
    KeyOutOfRange {
        /// The offending key index.
        key: KeyId,
        /// Size of the store's key space.
        num_keys: usize,
    },

    /// Key has no version visible at any timestamp; the store was never
    /// seeded for it.
    #[error("key {key} has no committed version")]
    KeyUninitialized {
        /// The unseeded key index.
        key: KeyId,
    },

    /// The transaction's write set is at capacity; the transaction is marked
    /// aborted and must be discarded.
    #[error("write set full: at most {capacity} distinct keys per transaction")]
    WriteSetFull {
        /// Configured maximum number of distinct keys per write set.
        capacity: usize,
    },

    /// A blocked lock acquisition was cancelled because the deadlock monitor
    /// chose this worker as a victim. The whole transaction must abort; the
    /// lock was not acquired.
    #[error("lock wait on key {key} cancelled: worker {worker} chosen as deadlock victim")]
    LockAborted {
        /// Key the worker was blocked on.
        key: KeyId,
        /// The victim worker.
        worker: WorkerId,
    },

    /// Commit-time validation found a version of a written key newer than
    /// the transaction's snapshot. First committer wins; this transaction
    /// lost the race.
    #[error(
        "write conflict on key {key}: version committed at ts {committed_ts}, snapshot at ts {snapshot_ts}"
    )]
    ValidationConflict {
        /// Key whose newest version postdates the snapshot.
        key: KeyId,
        /// Commit timestamp of the conflicting version.
        committed_ts: Timestamp,
        /// Snapshot timestamp of the losing transaction.
        snapshot_ts: Timestamp,
    },

    /// Commit was attempted on a transaction already marked aborted
    /// (for example after a write-set overflow).
    #[error("transaction already aborted")]
    AlreadyAborted,
}

/// Result type for mvkv operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Retryable errors are transaction outcomes decided by concurrency:
    /// running the same transaction again on a fresh snapshot may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::LockAborted { .. } | Error::ValidationConflict { .. }
        )
    }

    /// Check if this abort was forced by the deadlock monitor.
    pub fn is_deadlock_victim(&self) -> bool {
        matches!(self, Error::LockAborted { .. })
    }

    /// Check if this is a conflict error (first-committer-wins loss).
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::ValidationConflict { .. })
    }

    /// Check if this error reflects a setup or usage bug rather than a
    /// transaction outcome. Retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::KeyOutOfRange { .. } | Error::KeyUninitialized { .. }
        )
    }
}
