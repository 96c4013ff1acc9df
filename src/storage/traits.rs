//! Storage trait definitions

use crate::graph::{ArtifactRef, Node, NodeId, ProjectId, ProjectIdError, Record};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid project: {0}")]
    InvalidProject(#[from] ProjectIdError),

    #[error("timed out acquiring the log lock after {0:?}")]
    LockTimeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable append-only graph storage with per-project materialized views
///
/// Implementations must be thread-safe (Send + Sync). The log file is the
/// single source of truth; every in-memory structure is a rebuildable cache.
/// A corrupt or unparsable record is skipped with a logged warning during
/// replay, and the last valid record for an id wins.
pub trait GraphStore: Send + Sync {
    /// Append a record, scoping it to the project derived from `project_context`
    ///
    /// Stamps `created_at` on an unstamped node (a re-appended record keeps
    /// its original stamp), writes exactly one line under an exclusive
    /// advisory lock, then updates the in-memory view. On `LockTimeout` or
    /// `Io` no partial success is observable; `LockTimeout` is retryable.
    /// Returns the record as written.
    fn append(&self, record: Record, project_context: &str) -> StoreResult<Record>;

    /// Get a node by id, O(1) once the project is materialized
    fn get(&self, id: &NodeId, project: &ProjectId) -> StoreResult<Option<Node>>;

    /// Nodes never referenced as a parent by any other node, i.e. the branch tips
    fn heads(&self, project: &ProjectId) -> StoreResult<Vec<Node>>;

    /// Longest-path-to-root depth along `parents`
    ///
    /// A parentless node has depth 1. Cycles terminate with a bounded value.
    fn depth(&self, id: &NodeId, project: &ProjectId) -> StoreResult<usize>;

    /// Distinct project tags, via a single streaming pass over the log
    fn list_projects(&self) -> StoreResult<Vec<ProjectId>>;

    /// All nodes of a project in append order (first appearance)
    fn nodes_chronological(&self, project: &ProjectId) -> StoreResult<Vec<Node>>;

    /// Resolve a literal node id or a branch label to a node id
    fn resolve_branch(&self, id_or_label: &str, project: &ProjectId) -> StoreResult<NodeId>;

    /// All artifact records of a project, in append order
    fn list_artifacts(&self, project: &ProjectId) -> StoreResult<Vec<ArtifactRef>>;

    /// Drop the cached view and re-materialize from the log
    ///
    /// Peer processes' writes only become visible through this call; there is
    /// no push-based invalidation.
    fn reload_project(&self, project: &ProjectId) -> StoreResult<()>;
}
