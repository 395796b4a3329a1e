//! Global commit clock.
//!
//! A single atomic counter orders every commit in a store. Transactions
//! capture the clock at begin ([`CommitClock::now`]) and successful commits
//! advance it ([`CommitClock::tick`]).

use mvkv_core::types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic logical clock shared by all transactions of one store.
///
/// `tick` returns the post-increment value, so a commit timestamp minted
/// after a snapshot was captured is strictly greater than that snapshot.
/// The clock starts at [`CommitClock::SEED_TS`]; the first commit is
/// therefore stamped `SEED_TS + 1`.
#[derive(Debug)]
pub struct CommitClock {
    now: AtomicU64,
}

impl CommitClock {
    /// Timestamp carried by seed versions installed at store construction.
    pub const SEED_TS: Timestamp = 1;

    /// Create a clock positioned at the seed timestamp.
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(Self::SEED_TS),
        }
    }

    /// Current clock value. This is the snapshot timestamp a transaction
    /// beginning now would read at.
    #[inline]
    pub fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    /// Advance the clock and return the new value.
    ///
    /// Each call mints a distinct commit timestamp even under concurrent
    /// callers.
    #[inline]
    pub fn tick(&self) -> Timestamp {
        self.now.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Default for CommitClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_seed_timestamp() {
        let clock = CommitClock::new();
        assert_eq!(clock.now(), CommitClock::SEED_TS);
    }

    #[test]
    fn test_tick_returns_strictly_greater_values() {
        let clock = CommitClock::new();
        let snapshot = clock.now();
        let first = clock.tick();
        let second = clock.tick();
        assert!(first > snapshot, "commit ts must postdate the snapshot");
        assert_eq!(first, 2);
        assert_eq!(second, 3);
        assert_eq!(clock.now(), 3);
    }

    #[test]
    fn test_now_does_not_advance() {
        let clock = CommitClock::new();
        clock.now();
        clock.now();
        assert_eq!(clock.now(), CommitClock::SEED_TS);
    }

    #[test]
    fn test_concurrent_ticks_are_unique() {
        let clock = Arc::new(CommitClock::new());
        let mut handles = Vec::new();

        for _ in 0..10 {
            let clock = Arc::clone(&clock);
            handles.push(thread::spawn(move || {
                let mut minted = Vec::with_capacity(100);
                for _ in 0..100 {
                    minted.push(clock.tick());
                }
                minted
            }));
        }

        let mut all: Vec<Timestamp> = Vec::with_capacity(1000);
        for handle in handles {
            all.extend(handle.join().unwrap());
        }

        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000, "every tick must mint a distinct timestamp");
        assert_eq!(clock.now(), CommitClock::SEED_TS + 1000);
    }
}
