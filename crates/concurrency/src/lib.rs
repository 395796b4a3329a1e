//! Concurrency layer for mvkv
//!
//! This crate implements commit-time pessimistic locking with:
//! - LockManager: one worker-owned lock per key, blocking with broadcast wakeup
//! - WaitForGraph: waiter-to-owner edges maintained around every blocked wait
//! - DeadlockMonitor: background cycle scan that flags and wakes a victim
//! - AbortFlags: the channel through which a victim learns it must unwind
//!
//! Transactions avoid deadlock in the first place by locking their write
//! sets in ascending key order; the monitor is the backstop for lock users
//! that do not follow that discipline.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aborts;
pub mod locks;
pub mod monitor;
pub mod wait_graph;

pub use aborts::AbortFlags;
pub use locks::LockManager;
pub use monitor::DeadlockMonitor;
pub use wait_graph::WaitForGraph;
