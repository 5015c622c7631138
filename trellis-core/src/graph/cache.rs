//! Notification Cache
//!
//! The cache holds the property dependency graph of one view-model instance
//! and answers "which properties must also be notified when this one
//! changes?".
//!
//! # Algorithm
//!
//! Edges point from a notifying property to its dependents. The closure of a
//! source is computed breadth-first:
//!
//! 1. Seed the queue with the source's direct dependents, in registration
//!    order.
//! 2. Pop a name. Skip it if it is the source itself (a cycle routed back to
//!    the origin) or if it was already visited.
//! 3. Record it and enqueue its own dependents.
//!
//! The visited set bounds the traversal, so any cycle shape terminates and
//! each name appears once. Results are memoized per source and the whole memo
//! table is dropped whenever a new edge is registered.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;

use crate::error::{check_name, Error, Result};

#[derive(Default)]
struct Graph {
    /// Notifying property -> dependents, in registration order.
    edges: IndexMap<&'static str, IndexSet<&'static str>>,

    /// Memoized closures, keyed by source.
    closures: HashMap<&'static str, Arc<[&'static str]>>,
}

/// Dependency graph plus memoized transitive closures.
#[derive(Default)]
pub struct NotificationCache {
    graph: RwLock<Graph>,
}

impl NotificationCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register that changes to `source` also notify `target`.
    ///
    /// Empty names and self-loops are programmer errors. Registering a new
    /// edge invalidates every memoized closure; re-registering an existing
    /// one changes nothing.
    pub fn add_edge(&self, source: &'static str, target: &'static str) -> Result<()> {
        check_name(source, "notifying property name")?;
        check_name(target, "dependent property name")?;
        if source == target {
            return Err(Error::invalid(format!(
                "property `{source}` cannot notify itself"
            )));
        }

        let mut graph = self.graph.write();
        let inserted = graph.edges.entry(source).or_default().insert(target);
        if inserted {
            graph.closures.clear();
            tracing::trace!(source, target, "registered notification edge");
        }
        Ok(())
    }

    /// Every property reachable from `source`, excluding `source` itself.
    ///
    /// Blank or unknown sources yield an empty closure.
    pub fn transitive_targets(&self, source: &str) -> Arc<[&'static str]> {
        if source.trim().is_empty() {
            return Arc::from(Vec::new());
        }

        if let Some(hit) = self.graph.read().closures.get(source) {
            return Arc::clone(hit);
        }

        let mut graph = self.graph.write();
        // Another caller may have filled the slot while we waited.
        if let Some(hit) = graph.closures.get(source) {
            return Arc::clone(hit);
        }
        let Some((&origin, _)) = graph.edges.get_key_value(source) else {
            return Arc::from(Vec::new());
        };

        let closure: Arc<[&'static str]> = Arc::from(compute_closure(&graph.edges, origin));
        graph.closures.insert(origin, Arc::clone(&closure));
        closure
    }

    /// Direct dependents of `source`, in registration order.
    pub fn direct_targets(&self, source: &str) -> Vec<&'static str> {
        self.graph
            .read()
            .edges
            .get(source)
            .map(|targets| targets.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `source -> target` is registered.
    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.graph
            .read()
            .edges
            .get(source)
            .is_some_and(|targets| targets.contains(target))
    }

    /// Total number of registered edges.
    pub fn edge_count(&self) -> usize {
        self.graph.read().edges.values().map(IndexSet::len).sum()
    }

    /// Whether the closure of `source` is currently memoized.
    pub fn is_cached(&self, source: &str) -> bool {
        self.graph.read().closures.contains_key(source)
    }
}

fn compute_closure(
    edges: &IndexMap<&'static str, IndexSet<&'static str>>,
    origin: &'static str,
) -> Vec<&'static str> {
    let mut visited: IndexSet<&'static str> = IndexSet::new();
    let mut queue: VecDeque<&'static str> = edges
        .get(origin)
        .map(|targets| targets.iter().copied().collect())
        .unwrap_or_default();

    while let Some(name) = queue.pop_front() {
        if name == origin {
            tracing::trace!(origin, "notification cycle routed back to origin");
            continue;
        }
        if !visited.insert(name) {
            continue;
        }
        if let Some(next) = edges.get(name) {
            queue.extend(next.iter().copied().filter(|n| !visited.contains(n)));
        }
    }

    visited.into_iter().collect()
}

impl std::fmt::Debug for NotificationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let graph = self.graph.read();
        f.debug_struct("NotificationCache")
            .field("edges", &graph.edges)
            .field("cached", &graph.closures.len())
            .finish()
    }
}
