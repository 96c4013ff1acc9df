//! Storage backends for the reasoning graph
//!
//! Storage goes through the `GraphStore` trait. The primary implementation is
//! `LogStore`, an append-only line-record log shared by every project.

mod branch;
mod log;
mod traits;

pub use branch::BranchIndex;
pub use log::LogStore;
pub use traits::{GraphStore, StoreError, StoreResult};
