//! Project identity: the tenant key scoping every entity
//!
//! A project is derived deterministically from a caller-supplied context
//! string (typically the workspace path open in the editor): the last path
//! segment, sanitized to a restricted character set. It is never inferred
//! from node content.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from project name derivation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectIdError {
    #[error("project context is empty")]
    EmptyContext,

    #[error("project context '{0}' yields no usable name after sanitization")]
    Unsanitizable(String),
}

/// Tenant key derived from a project context string
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Derive a project id from a context string
    ///
    /// Takes the last path segment (either separator style), maps every
    /// character outside `[A-Za-z0-9._-]` to `-`, and strips leading and
    /// trailing `-`/`.` so the result is a usable filename-safe handle.
    pub fn derive(context: &str) -> Result<Self, ProjectIdError> {
        let trimmed = context.trim();
        if trimmed.is_empty() {
            return Err(ProjectIdError::EmptyContext);
        }

        let segment = trimmed
            .split(['/', '\\'])
            .filter(|s| !s.trim().is_empty())
            .next_back()
            .ok_or_else(|| ProjectIdError::Unsanitizable(context.to_string()))?;

        let sanitized: String = segment
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect();

        let name = sanitized.trim_matches(['-', '.']).to_string();
        if name.is_empty() {
            return Err(ProjectIdError::Unsanitizable(context.to_string()));
        }
        Ok(Self(name))
    }

    /// Placeholder for entities not yet scoped to a project
    ///
    /// The store re-scopes every record at append time, so this value never
    /// reaches the log.
    pub fn unscoped() -> Self {
        Self(String::new())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
