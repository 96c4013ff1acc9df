//! Threshold-triggered branch summarization
//!
//! After every append the coordinator inspects the branch's unsummarized
//! suffix; once it reaches the configured threshold the oldest bounded-size
//! chunk is condensed through the summarizer gateway and recorded as a
//! summary node parented on the chunk's last node. Gateway failure or a
//! blank summary appends nothing.

use super::branches::{chain_for_ref, lineage_to_root};
use crate::gateway::SummarizerGateway;
use crate::graph::{Node, NodeId, ProjectId, Record, Role};
use crate::storage::{GraphStore, StoreError, StoreResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Typed summarization failures
#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("not enough unsummarized nodes: have {have}, need {need}")]
    InsufficientNodes { have: usize, need: usize },

    #[error("branch is already fully summarized")]
    AlreadySummarized,

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("summarization failed: {0}")]
    Summarization(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SummarizeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::BranchNotFound(r) => SummarizeError::BranchNotFound(r),
            other => SummarizeError::Store(other),
        }
    }
}

/// Every id covered by any summary node's segment
pub(crate) fn covered_ids(nodes: &[Node]) -> HashSet<NodeId> {
    nodes
        .iter()
        .filter_map(|n| n.summarized_segment.as_ref())
        .flat_map(|segment| segment.iter().copied())
        .collect()
}

/// Trailing run of chain nodes not yet condensed into any summary
///
/// Summary nodes themselves never re-enter a later summary.
pub(crate) fn unsummarized_suffix<'a>(
    chain: &'a [Node],
    covered: &HashSet<NodeId>,
) -> Vec<&'a Node> {
    let boundary = chain
        .iter()
        .rposition(|n| n.role == Role::Summary || covered.contains(&n.id))
        .map(|i| i + 1)
        .unwrap_or(0);
    chain[boundary..].iter().collect()
}

/// Orchestrates summarization against the store and the external summarizer
pub struct SummarizationCoordinator {
    store: Arc<dyn GraphStore>,
    summarizer: Arc<dyn SummarizerGateway>,
    threshold: usize,
    chunk: usize,
    timeout: Duration,
}

impl SummarizationCoordinator {
    pub fn new(
        store: Arc<dyn GraphStore>,
        summarizer: Arc<dyn SummarizerGateway>,
        threshold: usize,
        chunk: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            summarizer,
            threshold,
            chunk,
            timeout,
        }
    }

    /// Explicit summarization of a branch (id, label, or newest by default)
    pub async fn summarize_branch(
        &self,
        project: &ProjectId,
        branch: Option<&str>,
    ) -> Result<Node, SummarizeError> {
        let chain = chain_for_ref(self.store.as_ref(), project, branch)?;
        self.summarize_chain(project, &chain).await
    }

    /// Post-append check: summarize the tip's branch if it crossed the threshold
    ///
    /// Failures here never fail the append that triggered the check; anything
    /// other than "not enough nodes yet" is logged.
    pub async fn check_after_append(&self, project: &ProjectId, tip: NodeId) -> Option<Node> {
        let chain = match lineage_to_root(self.store.as_ref(), project, tip) {
            Ok(chain) => chain,
            Err(error) => {
                warn!(%project, %error, "summarization check could not walk branch");
                return None;
            }
        };
        match self.summarize_chain(project, &chain).await {
            Ok(node) => Some(node),
            Err(SummarizeError::InsufficientNodes { .. })
            | Err(SummarizeError::AlreadySummarized) => None,
            Err(error) => {
                warn!(%project, %error, "summarization check failed");
                None
            }
        }
    }

    async fn summarize_chain(
        &self,
        project: &ProjectId,
        chain: &[Node],
    ) -> Result<Node, SummarizeError> {
        let all = self.store.nodes_chronological(project)?;
        let covered = covered_ids(&all);
        let suffix = unsummarized_suffix(chain, &covered);

        if !chain.is_empty() && suffix.is_empty() {
            return Err(SummarizeError::AlreadySummarized);
        }
        if suffix.len() < self.threshold {
            return Err(SummarizeError::InsufficientNodes {
                have: suffix.len(),
                need: self.threshold,
            });
        }

        // Oldest chunk first so summaries roll forward through the branch.
        let take = self.chunk.min(suffix.len()).max(1);
        let segment: Vec<Node> = suffix[..take].iter().map(|n| (*n).clone()).collect();

        let summary_text =
            match tokio::time::timeout(self.timeout, self.summarizer.summarize(&segment)).await {
                Ok(Ok(text)) => text,
                Ok(Err(error)) => return Err(SummarizeError::Summarization(error.to_string())),
                Err(_) => {
                    return Err(SummarizeError::Summarization(
                        "summarizer gateway exceeded its deadline".to_string(),
                    ))
                }
            };
        if summary_text.trim().is_empty() {
            return Err(SummarizeError::Summarization(
                "summarizer returned a blank summary".to_string(),
            ));
        }

        let segment_ids: Vec<NodeId> = segment.iter().map(|n| n.id).collect();
        let summary = Node::summary(project.clone(), summary_text, segment_ids.clone());
        let summary = append_node(self.store.as_ref(), project, summary)?;

        // Second append: link the segment's last node to its new child.
        if let Some(last) = segment_ids.last() {
            link_child(self.store.as_ref(), project, *last, summary.id)?;
        }

        debug!(
            %project,
            summary = %summary.id,
            covered = segment_ids.len(),
            "appended summary node"
        );
        Ok(summary)
    }
}

/// Append a node record, returning it as written
pub(crate) fn append_node(
    store: &dyn GraphStore,
    project: &ProjectId,
    node: Node,
) -> StoreResult<Node> {
    match store.append(Record::Node(node), project.as_str())? {
        Record::Node(n) => Ok(n),
        Record::Artifact(_) => unreachable!("node append returned artifact record"),
    }
}

/// Re-append `parent` with `child` added to its children list
pub(crate) fn link_child(
    store: &dyn GraphStore,
    project: &ProjectId,
    parent: NodeId,
    child: NodeId,
) -> StoreResult<()> {
    let mut node = store
        .get(&parent, project)?
        .ok_or(StoreError::NodeNotFound(parent))?;
    if !node.children.contains(&child) {
        node.children.push(child);
        append_node(store, project, node)?;
    }
    Ok(())
}
