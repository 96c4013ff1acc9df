//! Engine configuration, supplied at construction and immutable thereafter

use std::time::Duration;

/// Tunables for the workflow engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Trigger a review every N drafted actor nodes; `None` disables the cadence
    pub review_cadence: Option<usize>,
    /// Maximum needs_revision cycles per actor node before a forced reject
    pub max_revisions: u32,
    /// Unsummarized branch suffix length that triggers summarization
    pub summary_threshold: usize,
    /// Maximum number of nodes condensed into one summary
    pub summary_chunk: usize,
    /// Deadline applied to every gateway call
    pub gateway_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            review_cadence: Some(1),
            // The critic rejects outright after two revision attempts.
            max_revisions: 2,
            summary_threshold: 10,
            summary_chunk: 10,
            gateway_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Review every `every` drafted nodes
    pub fn with_review_cadence(mut self, every: usize) -> Self {
        self.review_cadence = Some(every);
        self
    }

    /// Only review on an explicit done signal
    pub fn without_review_cadence(mut self) -> Self {
        self.review_cadence = None;
        self
    }

    pub fn with_max_revisions(mut self, max: u32) -> Self {
        self.max_revisions = max;
        self
    }

    pub fn with_summary_threshold(mut self, threshold: usize) -> Self {
        self.summary_threshold = threshold;
        self
    }

    pub fn with_summary_chunk(mut self, chunk: usize) -> Self {
        self.summary_chunk = chunk;
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }
}
