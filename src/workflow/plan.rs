//! Branch resume context and plan export rendering

use super::branches::chain_for_ref;
use super::summarize::{covered_ids, unsummarized_suffix};
use crate::graph::{Node, ProjectId, Role};
use crate::storage::{GraphStore, StoreResult};

/// Default cap on the uncovered tail returned by `resume`
pub const DEFAULT_RESUME_LIMIT: usize = 20;

/// Context needed to pick a branch back up: its summaries plus the raw tail
#[derive(Debug, Clone)]
pub struct ResumeContext {
    /// Summary nodes covering the branch, oldest first
    pub summaries: Vec<Node>,
    /// Unsummarized tail of the branch, oldest first, capped
    pub recent: Vec<Node>,
}

/// Build resume context for a branch
pub(crate) fn resume(
    store: &dyn GraphStore,
    project: &ProjectId,
    branch: Option<&str>,
    limit: Option<usize>,
) -> StoreResult<ResumeContext> {
    let chain = chain_for_ref(store, project, branch)?;
    let all = store.nodes_chronological(project)?;
    let covered = covered_ids(&all);

    let chain_ids: std::collections::HashSet<_> = chain.iter().map(|n| n.id).collect();
    let summaries: Vec<Node> = all
        .iter()
        .filter(|n| n.role == Role::Summary)
        .filter(|n| {
            n.summarized_segment
                .as_ref()
                .is_some_and(|seg| seg.iter().any(|id| chain_ids.contains(id)))
        })
        .cloned()
        .collect();

    let limit = limit.unwrap_or(DEFAULT_RESUME_LIMIT);
    let suffix = unsummarized_suffix(&chain, &covered);
    let skip = suffix.len().saturating_sub(limit);
    let recent = suffix[skip..].iter().map(|n| (*n).clone()).collect();

    Ok(ResumeContext { summaries, recent })
}

/// Render a branch chronologically as markdown for human review
pub(crate) fn export_plan(
    store: &dyn GraphStore,
    project: &ProjectId,
    branch: Option<&str>,
) -> StoreResult<String> {
    let chain = chain_for_ref(store, project, branch)?;

    let mut out = String::new();
    out.push_str(&format!("# Plan: {}\n", project));
    if let Some(label) = chain.iter().find_map(|n| n.branch_label.as_deref()) {
        out.push_str(&format!("Branch: {}\n", label));
    }
    out.push('\n');

    for node in &chain {
        out.push_str(&format!("## [{}] {}\n", node.role, node.id));
        if let Some(ts) = node.created_at {
            out.push_str(&format!("_{}_\n", ts.to_rfc3339()));
        }
        if !node.tags.is_empty() {
            out.push_str(&format!("Tags: {}\n", node.tags.join(", ")));
        }
        if let Some(verdict) = node.verdict {
            match &node.verdict_reason {
                Some(reason) => out.push_str(&format!("Verdict: {} ({})\n", verdict, reason)),
                None => out.push_str(&format!("Verdict: {}\n", verdict)),
            }
        }
        if !node.content.is_empty() {
            out.push_str(&format!("\n{}\n", node.content));
        }
        if !node.artifacts.is_empty() {
            out.push_str("\nArtifacts:\n");
            for artifact in &node.artifacts {
                out.push_str(&format!("- {} ({})\n", artifact.name, artifact.uri));
            }
        }
        out.push('\n');
    }
    Ok(out)
}
