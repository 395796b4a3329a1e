//! Convenient imports for mvkv.
//!
//! Re-exports the types most callers need:
//!
//! ```
//! use mvkv::prelude::*;
//!
//! let store = Store::new(vec![0_i64; 4]);
//! let mut session = store.register();
//! let tx = session.begin();
//! assert_eq!(tx.read(0), Ok(0));
//! ```

// Main entry points
pub use crate::{Session, Store, StoreBuilder, Transaction};

// Error handling
pub use crate::{Error, Result};

// Core types
pub use crate::{KeyId, StoreStats, Timestamp, Version, WorkerId};
