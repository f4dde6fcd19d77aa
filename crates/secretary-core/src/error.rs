//! Core error types for secretary-core.
//!
//! Structural planning failures (dangling references, dependency cycles,
//! overlapping fixed tasks, timeouts) abort a whole planning pass and are
//! reported through [`CoreError`]. A task that simply cannot be placed is not
//! an error; see [`crate::planner::TaskOutcome::Unplaceable`].

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Core error type for secretary-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A `depends_on` entry (or a removal) points at a task that does not exist
    /// or is still needed.
    #[error("Reference error: task '{task_id}' references '{missing}'")]
    Reference { task_id: String, missing: String },

    /// The `depends_on` graph contains a cycle.
    #[error("Dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    /// Two fixed tasks occupy overlapping time.
    #[error("Scheduling conflict: fixed tasks '{first}' and '{second}' overlap from {overlap_start} to {overlap_end}")]
    SchedulingConflict {
        first: String,
        second: String,
        overlap_start: DateTime<Utc>,
        overlap_end: DateTime<Utc>,
    },

    /// The planning pass ran past the caller's budget.
    #[error("Planning timed out after exceeding its {}ms budget", .budget.as_millis())]
    PlanningTimeout { budget: Duration },

    /// Lookup of an unknown id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Insert of an id that is already present
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Whether this error aborts a planning pass as a structural data problem.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            CoreError::Reference { .. }
                | CoreError::DependencyCycle { .. }
                | CoreError::SchedulingConflict { .. }
        )
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Home/config directory could not be prepared
    #[error("Configuration directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid time range
    #[error("Invalid time range: end ({end}) must be greater than start ({start})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// A fixed task without a resolvable interval, or a flexible task with one
    #[error("Task '{task_id}' has inconsistent placement: {message}")]
    InconsistentPlacement { task_id: String, message: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationError::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_path() {
        let err = CoreError::DependencyCycle {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle: a -> b -> a");
        assert!(err.is_structural());
    }

    #[test]
    fn timeout_is_not_structural() {
        let err = CoreError::PlanningTimeout {
            budget: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("250ms"));
        assert!(!err.is_structural());
    }
}
