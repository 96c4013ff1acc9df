//! External collaborator gateways: reviewer and summarizer
//!
//! Defines the trait boundary for the two LLM-backed collaborators the
//! workflow engine calls, plus mock implementations for testing. How a real
//! gateway reaches its model (subprocess, HTTP, prompt shape) is deliberately
//! outside this crate; the engine only depends on these traits.

use crate::graph::{ArtifactRef, Node, Verdict};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Errors from gateway invocations
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway not available: {0}")]
    Unavailable(String),

    #[error("gateway call exceeded its deadline")]
    Timeout,

    #[error("gateway invocation failed: {0}")]
    Invocation(String),

    #[error("gateway response could not be parsed: {0}")]
    Parse(String),
}

/// Serialized actor node handed to the reviewer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub content: String,
    pub tags: Vec<String>,
    pub artifacts: Vec<ArtifactRef>,
}

impl ReviewRequest {
    pub fn from_node(node: &Node) -> Self {
        Self {
            content: node.content.clone(),
            tags: node.tags.clone(),
            artifacts: node.artifacts.clone(),
        }
    }
}

/// The reviewer's substantive verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutcome {
    pub verdict: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReviewOutcome {
    pub fn approved() -> Self {
        Self {
            verdict: Verdict::Approved,
            reason: None,
        }
    }

    pub fn needs_revision(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::NeedsRevision,
            reason: Some(reason.into()),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Reject,
            reason: Some(reason.into()),
        }
    }
}

/// Reviewer collaborator: classifies an actor node
///
/// Engine-side contract: on any failure the caller falls back to
/// `needs_revision` with a synthetic reason; a gateway failure must never
/// silently approve work.
#[async_trait]
pub trait ReviewerGateway: Send + Sync {
    async fn review(&self, request: &ReviewRequest) -> Result<ReviewOutcome, GatewayError>;
}

/// Summarizer collaborator: condenses an ordered segment of nodes
///
/// A blank or empty summary is treated by the caller identically to an
/// explicit error; no summary node is fabricated from it.
#[async_trait]
pub trait SummarizerGateway: Send + Sync {
    async fn summarize(&self, nodes: &[Node]) -> Result<String, GatewayError>;
}

/// Mock reviewer for testing. Pops scripted outcomes, then a default
pub struct MockReviewer {
    scripted: Mutex<VecDeque<Result<ReviewOutcome, GatewayError>>>,
    default: Result<ReviewOutcome, GatewayError>,
}

impl MockReviewer {
    /// A reviewer that approves everything not otherwise scripted
    pub fn approving() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default: Ok(ReviewOutcome::approved()),
        }
    }

    /// A reviewer whose unscripted calls fail
    pub fn failing(error: GatewayError) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default: Err(error),
        }
    }

    /// Queue an outcome for the next call
    pub fn with_outcome(self, outcome: ReviewOutcome) -> Self {
        self.scripted.lock().unwrap().push_back(Ok(outcome));
        self
    }

    /// Queue a failure for the next call
    pub fn with_failure(self, error: GatewayError) -> Self {
        self.scripted.lock().unwrap().push_back(Err(error));
        self
    }
}

#[async_trait]
impl ReviewerGateway for MockReviewer {
    async fn review(&self, _request: &ReviewRequest) -> Result<ReviewOutcome, GatewayError> {
        let scripted = self.scripted.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.default.clone())
    }
}

/// Mock summarizer for testing, with scripted summaries plus call recording
pub struct MockSummarizer {
    scripted: Mutex<VecDeque<Result<String, GatewayError>>>,
    default: Result<String, GatewayError>,
    /// Node contents of each segment the mock was asked to summarize
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockSummarizer {
    /// A summarizer that returns a fixed text for unscripted calls
    pub fn fixed(summary: impl Into<String>) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default: Ok(summary.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A summarizer whose unscripted calls fail
    pub fn failing(error: GatewayError) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            default: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Queue a summary for the next call
    pub fn with_summary(self, summary: impl Into<String>) -> Self {
        self.scripted.lock().unwrap().push_back(Ok(summary.into()));
        self
    }

    /// Queue a failure for the next call
    pub fn with_failure(self, error: GatewayError) -> Self {
        self.scripted.lock().unwrap().push_back(Err(error));
        self
    }

    /// Segments the mock has been asked to summarize so far
    pub fn recorded_calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SummarizerGateway for MockSummarizer {
    async fn summarize(&self, nodes: &[Node]) -> Result<String, GatewayError> {
        self.calls
            .lock()
            .unwrap()
            .push(nodes.iter().map(|n| n.content.clone()).collect());
        let scripted = self.scripted.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.default.clone())
    }
}
