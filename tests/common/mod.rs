//! Shared helpers for integration tests
#![allow(dead_code)]

use std::sync::Arc;
use tempfile::TempDir;
use thoughtloop::{
    EngineConfig, LogStore, MockReviewer, MockSummarizer, ProjectId, ReviewerGateway,
    SummarizerGateway, ThinkInput, WorkflowEngine,
};

/// Project context used by most scenarios
pub const CTX: &str = "/home/dev/sample-app";

/// The project id CTX derives to
pub fn project() -> ProjectId {
    ProjectId::derive(CTX).unwrap()
}

/// A store on a scratch log file; keep the TempDir alive for the test's duration
pub fn scratch_store() -> (TempDir, Arc<LogStore>) {
    let dir = TempDir::new().unwrap();
    let store = LogStore::open(dir.path().join("graph.jsonl")).unwrap();
    (dir, Arc::new(store))
}

/// Engine wired with the given collaborators
pub fn engine(
    store: Arc<LogStore>,
    reviewer: impl ReviewerGateway + 'static,
    summarizer: impl SummarizerGateway + 'static,
    config: EngineConfig,
) -> WorkflowEngine {
    WorkflowEngine::new(store, Arc::new(reviewer), Arc::new(summarizer), config)
}

/// Engine that approves everything and never summarizes (threshold out of reach)
pub fn quiet_engine(store: Arc<LogStore>) -> WorkflowEngine {
    engine(
        store,
        MockReviewer::approving(),
        MockSummarizer::fixed("unused"),
        EngineConfig::new()
            .without_review_cadence()
            .with_summary_threshold(usize::MAX),
    )
}

/// A tagged think input against CTX
pub fn think(content: &str) -> ThinkInput {
    ThinkInput::new(CTX, content).with_tags(vec!["task".into()])
}
