//! Background deadlock monitor.
//!
//! A single thread scans the wait-for graph on a fixed interval. When a
//! cycle is found it logs the graph, flags the victim's abort flag and
//! broadcasts every lock condition so the victim's wait observes the flag
//! and unwinds. Detection latency is bounded by the scan interval.

use crate::{AbortFlags, LockManager, WaitForGraph};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Stop signal shared with the monitor thread.
///
/// A condvar rather than a sleep, so shutdown does not have to wait out the
/// remainder of a scan interval.
#[derive(Default)]
struct Shutdown {
    stop: Mutex<bool>,
    wake: Condvar,
}

impl Shutdown {
    /// Wait up to `timeout` for the stop signal. Returns true once signalled.
    fn wait(&self, timeout: Duration) -> bool {
        let mut stop = self.stop.lock();
        if *stop {
            return true;
        }
        self.wake.wait_for(&mut stop, timeout);
        *stop
    }

    fn signal(&self) {
        *self.stop.lock() = true;
        self.wake.notify_all();
    }
}

/// Handle to the background deadlock monitor.
///
/// Dropping the handle signals the thread and joins it, so a store tears
/// down cleanly without leaking the scanner.
pub struct DeadlockMonitor {
    shutdown: Arc<Shutdown>,
    victims: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl DeadlockMonitor {
    /// Spawn the monitor thread scanning `waits` every `interval`.
    ///
    /// On each cycle detection the monitor flags the highest-id blocked
    /// worker via `aborts` and broadcasts all of `locks`' wait conditions.
    pub fn spawn(
        interval: Duration,
        waits: Arc<WaitForGraph>,
        locks: Arc<LockManager>,
        aborts: Arc<AbortFlags>,
    ) -> Self {
        let shutdown = Arc::new(Shutdown::default());
        let victims = Arc::new(AtomicU64::new(0));

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let victims = Arc::clone(&victims);
            thread::Builder::new()
                .name("mvkv-deadlock-monitor".to_string())
                .spawn(move || scan_loop(interval, &shutdown, &waits, &locks, &aborts, &victims))
                .expect("failed to spawn deadlock monitor thread")
        };

        Self {
            shutdown,
            victims,
            handle: Some(handle),
        }
    }

    /// Number of victims flagged since the monitor started.
    pub fn victim_count(&self) -> u64 {
        self.victims.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        self.shutdown.signal();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DeadlockMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn scan_loop(
    interval: Duration,
    shutdown: &Shutdown,
    waits: &WaitForGraph,
    locks: &LockManager,
    aborts: &AbortFlags,
    victims: &AtomicU64,
) {
    tracing::debug!(?interval, "deadlock monitor started");

    loop {
        if shutdown.wait(interval) {
            break;
        }
        if !waits.has_cycle() {
            continue;
        }

        tracing::warn!(graph = %waits.render(), "wait-for cycle detected");
        if let Some(victim) = waits.pick_victim() {
            tracing::warn!(worker = victim, "flagging deadlock victim");
            aborts.set(victim);
            // Flag first, then wake: a woken waiter must find its flag set.
            locks.wake_all();
            victims.fetch_add(1, Ordering::Relaxed);
        }
    }

    tracing::debug!("deadlock monitor stopped");
}
