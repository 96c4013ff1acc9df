//! Branch resolution helpers
//!
//! A branch is the chain of nodes reachable by following parent links back
//! from a head. Multi-parent merge nodes follow their first parent, which
//! matches single-branch resume semantics. Branch labels live on a branch's
//! first node, so resolving a label means finding the head whose lineage
//! contains the labeled node.

use crate::graph::{Node, NodeId, ProjectId};
use crate::storage::{GraphStore, StoreError, StoreResult};
use std::collections::HashSet;

/// Summary line for one branch of a project
#[derive(Debug, Clone)]
pub struct BranchInfo {
    /// The branch's tip
    pub head: NodeId,
    /// Label of the earliest labeled node on the branch, if any
    pub label: Option<String>,
    /// Nodes on the first-parent chain
    pub node_count: usize,
    /// Longest-path depth of the head
    pub depth: usize,
    /// Chain nodes not yet covered by any summary
    pub unsummarized: usize,
}

/// First-parent chain from `from` back to its root, returned root-first
///
/// A visited set bounds the walk on cyclic input.
pub(crate) fn lineage_to_root(
    store: &dyn GraphStore,
    project: &ProjectId,
    from: NodeId,
) -> StoreResult<Vec<Node>> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut cursor = Some(from);
    while let Some(id) = cursor {
        if !visited.insert(id) {
            break;
        }
        let node = store
            .get(&id, project)?
            .ok_or(StoreError::NodeNotFound(id))?;
        cursor = node.parents.first().copied();
        chain.push(node);
    }
    chain.reverse();
    Ok(chain)
}

/// Resolve a branch reference to its full chain, root-first
///
/// `branch` may be a node id or a branch label; `None` selects the most
/// recently started branch (the newest head). A labeled or referenced node
/// that is not itself a head resolves to the newest head whose lineage
/// contains it.
pub(crate) fn chain_for_ref(
    store: &dyn GraphStore,
    project: &ProjectId,
    branch: Option<&str>,
) -> StoreResult<Vec<Node>> {
    let heads = store.heads(project)?;

    let reference = match branch {
        Some(branch) => Some(store.resolve_branch(branch, project)?),
        None => None,
    };

    match reference {
        None => {
            let head = heads
                .last()
                .ok_or_else(|| StoreError::BranchNotFound(project.to_string()))?;
            lineage_to_root(store, project, head.id)
        }
        Some(ref_id) => {
            // Newest head first so forks resolve to the active line of work.
            for head in heads.iter().rev() {
                let chain = lineage_to_root(store, project, head.id)?;
                if chain.iter().any(|n| n.id == ref_id) {
                    return Ok(chain);
                }
            }
            // Reachable only through a non-first parent: treat the referenced
            // node itself as the tip.
            lineage_to_root(store, project, ref_id)
        }
    }
}

/// Describe every branch of a project, one entry per head
pub(crate) fn list_branches(
    store: &dyn GraphStore,
    project: &ProjectId,
) -> StoreResult<Vec<BranchInfo>> {
    let all = store.nodes_chronological(project)?;
    let covered = super::summarize::covered_ids(&all);

    let mut branches = Vec::new();
    for head in store.heads(project)? {
        let chain = lineage_to_root(store, project, head.id)?;
        let label = chain.iter().find_map(|n| n.branch_label.clone());
        let unsummarized = super::summarize::unsummarized_suffix(&chain, &covered).len();
        branches.push(BranchInfo {
            head: head.id,
            label,
            node_count: chain.len(),
            depth: store.depth(&head.id, project)?,
            unsummarized,
        });
    }
    Ok(branches)
}
