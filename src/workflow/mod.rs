//! Actor-critic workflow engine
//!
//! Orchestrates the actor (drafts reasoning nodes), the critic (gates each
//! node before it counts as accepted work), and the summarization
//! coordinator against the graph store. Actor nodes move through
//! DRAFTED → PENDING_REVIEW → APPROVED | NEEDS_REVISION | REJECTED, with
//! NEEDS_REVISION looping back to fresh drafts until the revision tracker
//! forces a reject.

mod branches;
mod plan;
mod policy;
mod revision;
mod summarize;

pub use branches::BranchInfo;
pub use plan::{ResumeContext, DEFAULT_RESUME_LIMIT};
pub use policy::{CadenceOrDonePolicy, CadencePolicy, DoneSignalPolicy, ReviewPolicy};
pub use revision::RevisionTracker;
pub use summarize::{SummarizationCoordinator, SummarizeError};

use crate::config::EngineConfig;
use crate::gateway::{ReviewOutcome, ReviewRequest, ReviewerGateway, SummarizerGateway};
use crate::graph::{ArtifactRef, Node, NodeId, ProjectId, Record, Role, Verdict};
use crate::storage::{GraphStore, StoreError};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from workflow operations
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Rejected before any durable write
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid review target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result type for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Caller input for one actor step
#[derive(Debug, Clone)]
pub struct ThinkInput {
    /// Context string the project is derived from (e.g. the open workspace path)
    pub project_context: String,
    /// The reasoning text
    pub content: String,
    /// Non-empty categorization tags (required for actor nodes)
    pub tags: Vec<String>,
    /// Artifacts produced or touched by this step
    pub artifacts: Vec<ArtifactRef>,
    /// Explicit parent ids (merge); empty means continue from the current heads
    pub parents: Vec<NodeId>,
    /// Label this node as the start of a named branch
    pub branch_label: Option<String>,
    /// "This unit of work is complete" signal
    pub done: bool,
}

impl ThinkInput {
    pub fn new(project_context: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            project_context: project_context.into(),
            content: content.into(),
            tags: Vec::new(),
            artifacts: Vec::new(),
            parents: Vec::new(),
            branch_label: None,
            done: false,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_artifacts(mut self, artifacts: Vec<ArtifactRef>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_parents(mut self, parents: Vec<NodeId>) -> Self {
        self.parents = parents;
        self
    }

    pub fn with_branch_label(mut self, label: impl Into<String>) -> Self {
        self.branch_label = Some(label.into());
        self
    }

    pub fn done(mut self) -> Self {
        self.done = true;
        self
    }
}

/// What an actor step produced
#[derive(Debug, Clone)]
pub struct ThinkOutcome {
    /// The appended actor node
    pub actor: Node,
    /// The critic node, when the review policy fired
    pub review: Option<Node>,
}

/// Materialized project summary returned by `switch_project`
#[derive(Debug, Clone)]
pub struct ProjectStatus {
    pub project: ProjectId,
    pub node_count: usize,
    pub branch_count: usize,
}

/// The workflow engine: actor, critic, and summarization against one store
pub struct WorkflowEngine {
    store: Arc<dyn GraphStore>,
    reviewer: Arc<dyn ReviewerGateway>,
    policy: Box<dyn ReviewPolicy>,
    tracker: RevisionTracker,
    coordinator: SummarizationCoordinator,
    config: EngineConfig,
    /// Actor nodes drafted per project since the last triggered review
    drafted: Mutex<HashMap<ProjectId, usize>>,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        reviewer: Arc<dyn ReviewerGateway>,
        summarizer: Arc<dyn SummarizerGateway>,
        config: EngineConfig,
    ) -> Self {
        let coordinator = SummarizationCoordinator::new(
            store.clone(),
            summarizer,
            config.summary_threshold,
            config.summary_chunk,
            config.gateway_timeout,
        );
        Self {
            store,
            reviewer,
            policy: Box::new(CadenceOrDonePolicy {
                every: config.review_cadence,
            }),
            tracker: RevisionTracker::new(config.max_revisions),
            coordinator,
            config,
            drafted: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the review-trigger policy
    pub fn with_policy(mut self, policy: Box<dyn ReviewPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Record one actor reasoning step
    ///
    /// Parents are the caller's explicit ids (an explicit merge) or the
    /// current branch heads. The summarization check runs unconditionally;
    /// the review policy decides whether the critic sees the node right away.
    pub async fn actor_think(&self, input: ThinkInput) -> WorkflowResult<ThinkOutcome> {
        let project = ProjectId::derive(&input.project_context).map_err(StoreError::from)?;
        if input.tags.is_empty() {
            return Err(WorkflowError::Validation(
                "actor nodes require at least one tag".to_string(),
            ));
        }

        let parents = if input.parents.is_empty() {
            self.store
                .heads(&project)?
                .into_iter()
                .map(|n| n.id)
                .collect()
        } else {
            for id in &input.parents {
                if self.store.get(id, &project)?.is_none() {
                    return Err(StoreError::NodeNotFound(*id).into());
                }
            }
            input.parents.clone()
        };

        let mut node = Node::actor(project.clone(), input.content.clone())
            .with_parents(parents.clone())
            .with_tags(input.tags.clone())
            .with_artifacts(input.artifacts.clone());
        if let Some(label) = &input.branch_label {
            node = node.with_branch_label(label.clone());
        }

        let node = match self
            .store
            .append(Record::Node(node), &input.project_context)?
        {
            Record::Node(n) => n,
            Record::Artifact(_) => unreachable!("node append returned artifact record"),
        };
        for artifact in &node.artifacts {
            self.store
                .append(Record::Artifact(artifact.clone()), &input.project_context)?;
        }
        for parent in &parents {
            summarize::link_child(self.store.as_ref(), &project, *parent, node.id)?;
        }
        debug!(%project, node = %node.id, parents = parents.len(), "appended actor node");

        self.coordinator.check_after_append(&project, node.id).await;

        let drafted = {
            let mut counts = self.drafted.lock().unwrap();
            let count = counts.entry(project.clone()).or_insert(0);
            *count += 1;
            *count
        };
        if self.policy.should_review(input.done, drafted) {
            self.drafted.lock().unwrap().insert(project.clone(), 0);
            let review = self.review_node(&project, node.id).await?;
            return Ok(ThinkOutcome {
                actor: node,
                review: Some(review),
            });
        }

        Ok(ThinkOutcome {
            actor: node,
            review: None,
        })
    }

    /// Review an actor node, appending a critic node with the verdict
    pub async fn critic_review(
        &self,
        project_context: &str,
        target: &str,
    ) -> WorkflowResult<Node> {
        let project = ProjectId::derive(project_context).map_err(StoreError::from)?;
        let id = NodeId::parse(target)
            .ok_or_else(|| WorkflowError::InvalidTarget(format!("not a node id: {target}")))?;
        self.review_node(&project, id).await
    }

    async fn review_node(&self, project: &ProjectId, id: NodeId) -> WorkflowResult<Node> {
        let target = self
            .store
            .get(&id, project)?
            .ok_or_else(|| WorkflowError::InvalidTarget(format!("node {id} does not exist")))?;
        if target.role != Role::Actor {
            return Err(WorkflowError::InvalidTarget(format!(
                "node {id} has role {}, only actor nodes are reviewable",
                target.role
            )));
        }

        let outcome = match self.local_guard(&target) {
            Some(outcome) => outcome,
            None => self.delegate_review(&target).await,
        };

        let critic = Node::critic(
            project.clone(),
            target.id,
            outcome.verdict,
            outcome.reason.clone(),
        )
        .with_content(outcome.reason.unwrap_or_default());
        let critic = summarize::append_node(self.store.as_ref(), project, critic)?;
        summarize::link_child(self.store.as_ref(), project, target.id, critic.id)?;

        match outcome.verdict {
            Verdict::NeedsRevision => {
                self.tracker.increment(&target.id);
            }
            Verdict::Approved | Verdict::Reject => self.tracker.delete(&target.id),
        }
        debug!(
            %project,
            target = %target.id,
            verdict = %outcome.verdict,
            "appended critic node"
        );

        // Critic nodes extend the branch too, so they get the same
        // post-append summarization check as actor nodes.
        self.coordinator.check_after_append(project, critic.id).await;
        Ok(critic)
    }

    /// Cheap checks applied before any gateway call, in override order
    fn local_guard(&self, target: &Node) -> Option<ReviewOutcome> {
        // Exhausted revision budget overrides everything else.
        if self.tracker.is_at_max(&target.id) {
            return Some(ReviewOutcome::reject(format!(
                "revision limit of {} reached; this line of work is rejected",
                self.tracker.max_revisions()
            )));
        }
        if target.content.trim().is_empty() {
            return Some(ReviewOutcome::needs_revision(
                "thought content is empty; describe the completed or proposed work",
            ));
        }
        if target.artifacts.is_empty() {
            if let Some(file) = mentioned_filename(&target.content) {
                return Some(ReviewOutcome::needs_revision(format!(
                    "content references '{file}' but the artifacts list is empty; \
                     attach an artifact entry for every file this step touches"
                )));
            }
        }
        None
    }

    /// Substantive verdict from the external reviewer, with safe fallback
    async fn delegate_review(&self, target: &Node) -> ReviewOutcome {
        let request = ReviewRequest::from_node(target);
        match tokio::time::timeout(self.config.gateway_timeout, self.reviewer.review(&request))
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => {
                warn!(target = %target.id, %error, "reviewer gateway failed, falling back");
                ReviewOutcome::needs_revision(format!(
                    "reviewer unavailable ({error}); revise and resubmit"
                ))
            }
            Err(_) => {
                warn!(target = %target.id, "reviewer gateway timed out, falling back");
                ReviewOutcome::needs_revision(
                    "reviewer timed out before returning a verdict; revise and resubmit",
                )
            }
        }
    }

    /// Explicitly summarize a branch (by id, label, or newest head)
    pub async fn summarize_branch(
        &self,
        project_context: &str,
        branch: Option<&str>,
    ) -> Result<Node, SummarizeError> {
        let project = ProjectId::derive(project_context).map_err(StoreError::from)?;
        self.coordinator.summarize_branch(&project, branch).await
    }

    /// Describe every branch of a project
    pub fn list_branches(&self, project_context: &str) -> WorkflowResult<Vec<BranchInfo>> {
        let project = ProjectId::derive(project_context).map_err(StoreError::from)?;
        Ok(branches::list_branches(self.store.as_ref(), &project)?)
    }

    /// Summaries plus the raw tail of a branch, for picking work back up
    pub fn resume(
        &self,
        project_context: &str,
        branch: Option<&str>,
        limit: Option<usize>,
    ) -> WorkflowResult<ResumeContext> {
        let project = ProjectId::derive(project_context).map_err(StoreError::from)?;
        Ok(plan::resume(self.store.as_ref(), &project, branch, limit)?)
    }

    /// Render a branch as markdown
    pub fn export_plan(
        &self,
        project_context: &str,
        branch: Option<&str>,
    ) -> WorkflowResult<String> {
        let project = ProjectId::derive(project_context).map_err(StoreError::from)?;
        Ok(plan::export_plan(self.store.as_ref(), &project, branch)?)
    }

    /// All projects present on the log
    pub fn list_projects(&self) -> WorkflowResult<Vec<ProjectId>> {
        Ok(self.store.list_projects()?)
    }

    /// All artifact records of a project
    pub fn list_artifacts(&self, project_context: &str) -> WorkflowResult<Vec<ArtifactRef>> {
        let project = ProjectId::derive(project_context).map_err(StoreError::from)?;
        Ok(self.store.list_artifacts(&project)?)
    }

    /// Validate a project name without writing anything
    ///
    /// Projects materialize on their first append; this only confirms the
    /// name derives to a usable tenant key.
    pub fn create_project(&self, name: &str) -> WorkflowResult<ProjectId> {
        Ok(ProjectId::derive(name).map_err(StoreError::from)?)
    }

    /// Re-materialize a project and report its shape
    pub fn switch_project(&self, project_context: &str) -> WorkflowResult<ProjectStatus> {
        let project = ProjectId::derive(project_context).map_err(StoreError::from)?;
        self.store.reload_project(&project)?;
        let node_count = self.store.nodes_chronological(&project)?.len();
        let branch_count = self.store.heads(&project)?.len();
        Ok(ProjectStatus {
            project,
            node_count,
            branch_count,
        })
    }

    /// The engine's revision tracker (counts are per engine instance)
    pub fn tracker(&self) -> &RevisionTracker {
        &self.tracker
    }
}

/// First filename-looking token in the content, if any
fn mentioned_filename(content: &str) -> Option<String> {
    static FILENAME: OnceLock<Regex> = OnceLock::new();
    let re = FILENAME.get_or_init(|| {
        Regex::new(
            r"(?i)[\w][\w./\\-]*\.(rs|ts|tsx|js|jsx|py|go|java|rb|c|h|cpp|hpp|cs|toml|yaml|yml|json|md|sql|sh)\b",
        )
        .expect("filename pattern compiles")
    });
    re.find(content).map(|m| m.as_str().to_string())
}
