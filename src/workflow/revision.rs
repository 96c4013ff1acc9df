//! Per-node revision counter bounding the actor-critic retry loop
//!
//! Instantiated per workflow engine and injected, never process-wide global
//! state, so concurrent workflows and tenants cannot bleed counts into each
//! other. Counts are in-memory only and reset with the engine.

use crate::graph::NodeId;
use std::collections::HashMap;
use std::sync::Mutex;

/// Tracks how many needs_revision cycles each actor node has gone through
#[derive(Debug)]
pub struct RevisionTracker {
    counts: Mutex<HashMap<NodeId, u32>>,
    max_revisions: u32,
}

impl RevisionTracker {
    pub fn new(max_revisions: u32) -> Self {
        Self {
            counts: Mutex::new(HashMap::new()),
            max_revisions,
        }
    }

    /// Current count for a node (0 if never revised)
    pub fn get(&self, id: &NodeId) -> u32 {
        self.counts.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    /// Record one needs_revision cycle, returning the new count
    pub fn increment(&self, id: &NodeId) -> u32 {
        let mut counts = self.counts.lock().unwrap();
        let count = counts.entry(*id).or_insert(0);
        *count += 1;
        *count
    }

    /// Undo one recorded cycle, saturating at zero
    pub fn decrement(&self, id: &NodeId) -> u32 {
        let mut counts = self.counts.lock().unwrap();
        match counts.get_mut(id) {
            Some(count) => {
                *count = count.saturating_sub(1);
                *count
            }
            None => 0,
        }
    }

    /// Drop the count for a node entirely
    pub fn delete(&self, id: &NodeId) {
        self.counts.lock().unwrap().remove(id);
    }

    /// Has the node exhausted its revision budget?
    ///
    /// Once true, the next review is forced to reject so the loop terminates.
    pub fn is_at_max(&self, id: &NodeId) -> bool {
        self.get(id) >= self.max_revisions
    }

    pub fn max_revisions(&self) -> u32 {
        self.max_revisions
    }
}
