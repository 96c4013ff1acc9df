//! Node representation in the reasoning graph

use super::project::ProjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Create a new random NodeId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a NodeId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a NodeId from its string form
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The part a node plays in the actor-critic loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A reasoning step drafted by the actor
    Actor,
    /// A review of an actor node
    Critic,
    /// A condensed summary of a branch segment
    Summary,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Actor => write!(f, "actor"),
            Role::Critic => write!(f, "critic"),
            Role::Summary => write!(f, "summary"),
        }
    }
}

/// A critic's classification of an actor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Approved,
    NeedsRevision,
    Reject,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Approved => write!(f, "approved"),
            Verdict::NeedsRevision => write!(f, "needs_revision"),
            Verdict::Reject => write!(f, "reject"),
        }
    }
}

/// Reference to an artifact (file, document, produced output) attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Unique identifier
    pub id: String,
    /// Owning project
    pub project: ProjectId,
    /// Human-readable name
    pub name: String,
    /// Path or URI locating the artifact
    pub uri: String,
    /// Optional content hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    /// Optional content type (e.g. "text/x-rust")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl ArtifactRef {
    /// Create a new artifact reference with a random id
    ///
    /// The project is re-scoped by the store at append time.
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project: ProjectId::unscoped(),
            name: name.into(),
            uri: uri.into(),
            hash: None,
            content_type: None,
        }
    }

    /// Set the content hash
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A node in the reasoning graph
///
/// Nodes are append-only: the only mutation is re-appending a record with an
/// updated `children` list, and the last record for an id wins on replay.
/// `children` is a derived view, rebuilt from every node's `parents`
/// pointers when a project is materialized, so a crash between the two
/// related appends never leaves a dangling link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,
    /// Owning project (tenant key)
    pub project: ProjectId,
    /// The reasoning text, verdict commentary, or summary body
    pub content: String,
    /// Role within the actor-critic loop
    pub role: Role,
    /// Critic verdict (critic nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Why the verdict was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict_reason: Option<String>,
    /// The node a critic node reviews
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<NodeId>,
    /// Ordered parent ids
    #[serde(default)]
    pub parents: Vec<NodeId>,
    /// Ordered child ids (derived view, see type docs)
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// Stamped by the store on first append and preserved across re-appends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Categorization tags; the workflow layer requires these on actor nodes
    #[serde(default)]
    pub tags: Vec<String>,
    /// Artifacts attached to this node
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    /// Human handle for a branch's first node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_label: Option<String>,
    /// Ids covered by a summary node, in chronological order (summary nodes only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarized_segment: Option<Vec<NodeId>>,
}

impl Node {
    /// Create an actor node
    pub fn actor(project: ProjectId, content: impl Into<String>) -> Self {
        Self::bare(project, content, Role::Actor)
    }

    /// Create a critic node reviewing `target`
    ///
    /// A critic node has exactly one parent: the node under review.
    pub fn critic(
        project: ProjectId,
        target: NodeId,
        verdict: Verdict,
        reason: Option<String>,
    ) -> Self {
        let mut node = Self::bare(project, String::new(), Role::Critic);
        node.target = Some(target);
        node.parents = vec![target];
        node.verdict = Some(verdict);
        node.verdict_reason = reason;
        node
    }

    /// Create a summary node covering `segment`, parented on the segment's last node
    pub fn summary(project: ProjectId, content: impl Into<String>, segment: Vec<NodeId>) -> Self {
        let mut node = Self::bare(project, content, Role::Summary);
        if let Some(last) = segment.last() {
            node.parents = vec![*last];
        }
        node.summarized_segment = Some(segment);
        node
    }

    fn bare(project: ProjectId, content: impl Into<String>, role: Role) -> Self {
        Self {
            id: NodeId::new(),
            project,
            content: content.into(),
            role,
            verdict: None,
            verdict_reason: None,
            target: None,
            parents: Vec::new(),
            children: Vec::new(),
            created_at: None,
            tags: Vec::new(),
            artifacts: Vec::new(),
            branch_label: None,
            summarized_segment: None,
        }
    }

    /// Set the parent ids
    pub fn with_parents(mut self, parents: Vec<NodeId>) -> Self {
        self.parents = parents;
        self
    }

    /// Add tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Attach artifacts
    pub fn with_artifacts(mut self, artifacts: Vec<ArtifactRef>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Set the commentary text
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Label this node as the start of a named branch
    pub fn with_branch_label(mut self, label: impl Into<String>) -> Self {
        self.branch_label = Some(label.into());
        self
    }
}

/// One self-describing record on the append-only log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Record {
    Node(Node),
    Artifact(ArtifactRef),
}

impl Record {
    /// The project tag carried by the record
    pub fn project(&self) -> &ProjectId {
        match self {
            Record::Node(n) => &n.project,
            Record::Artifact(a) => &a.project,
        }
    }

    /// Re-scope the record to a project
    pub fn set_project(&mut self, project: ProjectId) {
        match self {
            Record::Node(n) => n.project = project,
            Record::Artifact(a) => a.project = project,
        }
    }
}
