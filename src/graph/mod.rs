//! Core graph data structures

mod node;
mod project;

pub use node::{ArtifactRef, Node, NodeId, Record, Role, Verdict};
pub use project::{ProjectId, ProjectIdError};
