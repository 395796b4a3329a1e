//! Wait-for graph over blocked workers.
//!
//! The graph records which worker is blocked behind which lock owner. Lock
//! acquisition adds an edge for every wait; the edge set of a worker is
//! dropped the moment it stops blocking. A cycle in this graph is a deadlock.

use mvkv_core::types::WorkerId;
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::Write as _;

/// Directed waiter-to-owner edges between workers.
///
/// An edge `a -> b` means worker `a` is blocked on a lock currently owned by
/// worker `b`. Multiple waits produce multiple outgoing edges; edges are
/// cleared per waiter, not per edge, because a worker unblocks as a whole.
///
/// # Thread Safety
///
/// Every operation takes the graph's single mutex. Critical sections are
/// short: the graph only ever holds the currently blocked workers, so scans
/// touch a handful of nodes.
pub struct WaitForGraph {
    edges: Mutex<FxHashMap<WorkerId, FxHashSet<WorkerId>>>,
}

impl WaitForGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            edges: Mutex::new(FxHashMap::default()),
        }
    }

    /// Record that `waiter` is blocked on a lock held by `owner`.
    ///
    /// Self-edges are ignored; a worker re-acquiring a key it already owns
    /// never blocks.
    pub fn add_edge(&self, waiter: WorkerId, owner: WorkerId) {
        if waiter == owner {
            return;
        }
        self.edges.lock().entry(waiter).or_default().insert(owner);
    }

    /// Drop every outgoing edge of `waiter`.
    ///
    /// Called when the waiter acquires its lock or abandons the wait.
    pub fn clear_waiter(&self, waiter: WorkerId) {
        self.edges.lock().remove(&waiter);
    }

    /// Check whether any wait cycle exists.
    ///
    /// Runs a depth-first search with an on-stack set from every waiter.
    /// Owners that are not themselves waiting are leaves and terminate the
    /// search.
    pub fn has_cycle(&self) -> bool {
        let edges = self.edges.lock();
        let mut waiters: Vec<WorkerId> = edges.keys().copied().collect();
        waiters.sort_unstable();

        let mut visited = FxHashSet::default();
        let mut on_stack = FxHashSet::default();
        for waiter in waiters {
            if !visited.contains(&waiter) && dfs(&edges, waiter, &mut visited, &mut on_stack) {
                return true;
            }
        }
        false
    }

    /// Highest-id worker that currently has at least one outgoing edge.
    ///
    /// This is the victim the deadlock monitor aborts when a cycle is found.
    pub fn pick_victim(&self) -> Option<WorkerId> {
        let edges = self.edges.lock();
        edges
            .iter()
            .filter(|(_, owners)| !owners.is_empty())
            .map(|(waiter, _)| *waiter)
            .max()
    }

    /// True when no worker is blocked.
    pub fn is_empty(&self) -> bool {
        self.edges.lock().is_empty()
    }

    /// Total number of edges currently recorded.
    pub fn edge_count(&self) -> usize {
        self.edges.lock().values().map(|owners| owners.len()).sum()
    }

    /// Human-readable listing of the current edges, one waiter per line.
    pub fn render(&self) -> String {
        let edges = self.edges.lock();
        if edges.is_empty() {
            return "wait-for graph: empty".to_string();
        }

        let mut waiters: Vec<WorkerId> = edges.keys().copied().collect();
        waiters.sort_unstable();

        let mut out = String::from("wait-for graph:");
        for waiter in waiters {
            let mut owners: Vec<WorkerId> = edges[&waiter].iter().copied().collect();
            owners.sort_unstable();
            let _ = write!(out, "\n  worker {waiter} -> {owners:?}");
        }
        out
    }
}

impl Default for WaitForGraph {
    fn default() -> Self {
        Self::new()
    }
}

fn dfs(
    edges: &FxHashMap<WorkerId, FxHashSet<WorkerId>>,
    node: WorkerId,
    visited: &mut FxHashSet<WorkerId>,
    on_stack: &mut FxHashSet<WorkerId>,
) -> bool {
    visited.insert(node);
    on_stack.insert(node);

    if let Some(owners) = edges.get(&node) {
        for &owner in owners {
            if on_stack.contains(&owner) {
                return true;
            }
            if !visited.contains(&owner) && dfs(edges, owner, visited, on_stack) {
                return true;
            }
        }
    }

    on_stack.remove(&node);
    false
}
