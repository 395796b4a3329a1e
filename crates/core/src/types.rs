//! Core types for the versioned store
//!
//! This module defines the fundamental types used throughout the system:
//! - [`Timestamp`]: Logical commit-clock value ordering all writes
//! - [`KeyId`]: Index into the store's fixed key space
//! - [`WorkerId`]: Identity of a registered worker session
//! - [`Version`]: One committed value of one key

/// Logical timestamp drawn from the store's commit clock.
///
/// Timestamps totally order committed writes: every transaction captures the
/// clock at begin (its snapshot) and every successful commit advances it.
/// The value `0` is never assigned; seed versions are stamped `1` and the
/// first commit is stamped `2`.
pub type Timestamp = u64;

/// Index of a key in the store's fixed key space (`0..num_keys`).
///
/// The key space is sized once at store construction and never grows.
pub type KeyId = usize;

/// Identity of a worker session registered with a store.
///
/// Worker ids are allocated sequentially from zero and never reused for the
/// lifetime of the store. The deadlock monitor uses them to pick victims, so
/// two concurrent sessions must never share an id.
pub type WorkerId = usize;

/// A single committed version of a key.
///
/// Versions are immutable once published: the version chain for a key only
/// ever grows, and the `commit_ts` of successive versions strictly increases.
///
/// # Examples
///
/// ```
/// use mvkv_core::types::Version;
///
/// let v = Version::new(42_i64, 7);
/// assert_eq!(v.value, 42);
/// assert_eq!(v.commit_ts, 7);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version<V> {
    /// The committed value.
    pub value: V,
    /// Commit timestamp assigned when this version was published.
    pub commit_ts: Timestamp,
}

impl<V> Version<V> {
    /// Create a version stamped with `commit_ts`.
    pub fn new(value: V, commit_ts: Timestamp) -> Self {
        Self { value, commit_ts }
    }
}
