//! Core types and errors for the mvkv store.
//!
//! This crate has no store logic of its own. It defines the vocabulary the
//! other crates share:
//! - [`types`]: timestamps, key and worker identifiers, committed versions
//! - [`error`]: the unified error taxonomy and `Result` alias

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{KeyId, Timestamp, Version, WorkerId};
