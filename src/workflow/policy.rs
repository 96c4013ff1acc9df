//! Review-trigger policy
//!
//! When a freshly drafted actor node should go straight to the critic is an
//! injectable predicate rather than a hard-coded rule, since the trigger
//! condition is expected to evolve.
//!
//! The cadence counts drafted nodes since the last triggered review, not
//! accepted ones: verdicts only exist once a review fires, so they cannot
//! feed the trigger that starts it. A policy keyed on accepted work belongs
//! in a custom `ReviewPolicy` implementation.

/// Decides whether a newly drafted node is reviewed immediately
pub trait ReviewPolicy: Send + Sync {
    /// `done` is the caller's "this unit of work is complete" signal;
    /// `drafted_since_review` counts actor nodes in this project since the
    /// last triggered review, including the one just drafted.
    fn should_review(&self, done: bool, drafted_since_review: usize) -> bool;
}

/// Review every `every` drafted nodes
#[derive(Debug, Clone)]
pub struct CadencePolicy {
    pub every: usize,
}

impl ReviewPolicy for CadencePolicy {
    fn should_review(&self, _done: bool, drafted_since_review: usize) -> bool {
        self.every > 0 && drafted_since_review >= self.every
    }
}

/// Review only when the caller signals completion
#[derive(Debug, Clone)]
pub struct DoneSignalPolicy;

impl ReviewPolicy for DoneSignalPolicy {
    fn should_review(&self, done: bool, _drafted_since_review: usize) -> bool {
        done
    }
}

/// Default policy: a fixed cadence, or an explicit done signal, whichever
/// fires first
#[derive(Debug, Clone)]
pub struct CadenceOrDonePolicy {
    /// `None` disables the cadence half
    pub every: Option<usize>,
}

impl ReviewPolicy for CadenceOrDonePolicy {
    fn should_review(&self, done: bool, drafted_since_review: usize) -> bool {
        if done {
            return true;
        }
        match self.every {
            Some(every) if every > 0 => drafted_since_review >= every,
            _ => false,
        }
    }
}
