//! Branch label index, built while materializing a project

use crate::graph::NodeId;
use std::collections::HashMap;

/// Maps human branch labels to the id of the branch's first node
///
/// Rebuilt on every materialization. If a label was appended twice the last
/// record wins, consistent with log compaction by id.
#[derive(Debug, Default, Clone)]
pub struct BranchIndex {
    labels: HashMap<String, NodeId>,
}

impl BranchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a label for a node, replacing any previous binding
    pub fn insert(&mut self, label: impl Into<String>, id: NodeId) {
        self.labels.insert(label.into(), id);
    }

    /// Look up a label
    pub fn get(&self, label: &str) -> Option<NodeId> {
        self.labels.get(label).copied()
    }

    /// All known labels with their node ids
    pub fn entries(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.labels.iter().map(|(l, id)| (l.as_str(), *id))
    }

    /// Resolve a literal node id or a known label
    pub fn resolve(&self, id_or_label: &str) -> Option<NodeId> {
        NodeId::parse(id_or_label).or_else(|| self.get(id_or_label))
    }
}
