//! Thoughtloop: persistent actor-critic reasoning graph engine
//!
//! An automated actor records reasoning steps into a durable, branchable
//! graph; an automated critic gates each step before it counts as accepted
//! work; periodic summarization bounds context growth.
//!
//! # Core Concepts
//!
//! - **Nodes**: reasoning steps, critic verdicts, and summaries in a DAG
//! - **Projects**: tenants sharing one append-only log file
//! - **Branches**: first-parent chains back from the graph's heads
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use thoughtloop::{
//!     EngineConfig, LogStore, MockReviewer, MockSummarizer, ThinkInput, WorkflowEngine,
//! };
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(LogStore::open("graph.jsonl")?);
//! let engine = WorkflowEngine::new(
//!     store,
//!     Arc::new(MockReviewer::approving()),
//!     Arc::new(MockSummarizer::fixed("summary")),
//!     EngineConfig::default(),
//! );
//! let outcome = engine
//!     .actor_think(
//!         ThinkInput::new("/home/dev/my-app", "Sketched the session model")
//!             .with_tags(vec!["design".into()]),
//!     )
//!     .await?;
//! println!("drafted {}", outcome.actor.id);
//! # Ok(())
//! # }
//! ```

mod config;
pub mod gateway;
mod graph;
pub mod storage;
pub mod workflow;

pub use config::EngineConfig;
pub use gateway::{
    GatewayError, MockReviewer, MockSummarizer, ReviewOutcome, ReviewRequest, ReviewerGateway,
    SummarizerGateway,
};
pub use graph::{ArtifactRef, Node, NodeId, ProjectId, ProjectIdError, Record, Role, Verdict};
pub use storage::{BranchIndex, GraphStore, LogStore, StoreError, StoreResult};
pub use workflow::{
    BranchInfo, CadenceOrDonePolicy, CadencePolicy, DoneSignalPolicy, ProjectStatus, ResumeContext,
    ReviewPolicy, RevisionTracker, SummarizationCoordinator, SummarizeError, ThinkInput,
    ThinkOutcome, WorkflowEngine, WorkflowError, WorkflowResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
