//! Storage layer for mvkv
//!
//! This crate implements the multi-version storage backend with:
//! - VersionStore: per-key append-only version chains behind per-key mutexes
//! - CommitClock: the global atomic timestamp counter ordering all commits
//!
//! Snapshot visibility lives here; locking, validation and the transaction
//! protocol live in the concurrency and engine crates.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod version_store;

pub use clock::CommitClock;
pub use version_store::VersionStore;

// Re-export the version type alongside the store that produces it.
pub use mvkv_core::types::Version;
