//! # mvkv
//!
//! Embedded, in-memory, multi-version key-value store with optimistic commit
//! validation, commit-time per-key locking, and automatic deadlock
//! detection.
//!
//! Keys are indices into a fixed key space seeded at construction. Every
//! transaction reads a consistent snapshot of the store, buffers its writes
//! locally, and publishes them all-or-nothing at commit: written keys are
//! locked in ascending order, validated against the snapshot
//! (first-committer-wins), and appended as new versions under a freshly
//! minted commit timestamp. A background monitor scans the wait-for graph of
//! blocked workers and force-aborts a victim whenever a cycle forms.
//!
//! ## Quick Start
//!
//! ```
//! use mvkv::prelude::*;
//!
//! # fn main() -> mvkv::Result<()> {
//! // Seed a store with two keys.
//! let store = Store::new(vec![100_i64, 200]);
//!
//! // Each worker registers a session and drives one transaction at a time.
//! let mut session = store.register();
//!
//! let mut tx = session.begin();
//! let a = tx.read(0)?;
//! let b = tx.read(1)?;
//! tx.write(0, b)?;
//! tx.write(1, a)?;
//! tx.commit()?;
//!
//! assert_eq!(store.latest(0)?, 200);
//! assert_eq!(store.latest(1)?, 100);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure model
//!
//! Conflicts and forced deadlock aborts are ordinary outcomes, not bugs: a
//! failed commit publishes nothing and the caller decides whether to retry
//! on a fresh snapshot. [`Error::is_retryable`] classifies them.
//!
//! ## Guarantees and limits
//!
//! - Snapshot reads: a transaction never observes a commit newer than its
//!   snapshot, nor a half-published commit.
//! - Commit timestamps strictly increase and define the write serialization
//!   order.
//! - Reads are not tracked, so validation catches write-write conflicts
//!   only; write skew is possible (no full serializability claim).
//! - Versions are never reclaimed; the store grows for its lifetime.

#![warn(missing_docs)]

pub mod prelude;

// Re-export main entry points
pub use mvkv_engine::{Session, Store, StoreBuilder, StoreStats, Transaction};

// Re-export error handling
pub use mvkv_core::{Error, Result};

// Re-export core types
pub use mvkv_core::types::{KeyId, Timestamp, Version, WorkerId};
