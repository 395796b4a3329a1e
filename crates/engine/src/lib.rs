//! Transaction engine for mvkv
//!
//! This crate assembles the storage and concurrency layers into a usable
//! store:
//! - [`Store`]: the context object owning the clock, version chains, lock
//!   table, wait-for graph, abort flags and the deadlock monitor
//! - [`Session`]: a registered worker identity; the only way to begin
//!   transactions
//! - [`Transaction`]: snapshot reads, buffered writes, and the sorted-lock
//!   optimistic commit protocol

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod store;
pub mod transaction;

pub use store::{Session, Store, StoreBuilder, StoreStats};
pub use transaction::Transaction;
