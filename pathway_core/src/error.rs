//! Error types for path generation.

use std::time::Duration;

use thiserror::Error;

use crate::path::{PathState, SkipReason, StepStatus};
use crate::types::{ObjectiveId, StudentId};

/// Main error type for the path generation core.
///
/// Objective-level failures (`NoCandidates`, `Store`) are contained by the
/// planner and annotated on the affected step. Graph integrity problems and
/// whole-path failures reach the caller.
#[derive(Error, Debug)]
pub enum PathwayError {
    /// Adding prerequisite edges would create a cycle.
    #[error("Adding objective {objective} would create a prerequisite cycle via {via:?}")]
    Cycle {
        /// Objective whose insert was rejected
        objective: ObjectiveId,
        /// Objectives on the offending cycle
        via: Vec<ObjectiveId>,
    },

    /// Referenced objective is not part of the competency graph.
    #[error("Unknown objective: {0}")]
    UnknownObjective(ObjectiveId),

    /// Objective failed validation against the configured bounds.
    #[error("Invalid objective {objective}: {message}")]
    InvalidObjective {
        /// Offending objective
        objective: ObjectiveId,
        /// What was wrong with it
        message: String,
    },

    /// Progress event carried an unusable score.
    #[error("Invalid progress event for {objective}: {message}")]
    InvalidProgress {
        /// Objective the event refers to
        objective: ObjectiveId,
        /// What was wrong with it
        message: String,
    },

    /// Content store produced no usable candidates for an objective.
    #[error("No candidates for objective {objective}: {reason}")]
    NoCandidates {
        /// Objective that could not be resolved
        objective: ObjectiveId,
        /// Why it could not be resolved
        reason: SkipReason,
    },

    /// No objective of the request could be resolved.
    #[error("Learning path is empty: no objective could be resolved")]
    EmptyPath,

    /// Step status change is not a forward transition.
    #[error("Invalid transition for step {index}: {from} -> {to}")]
    InvalidTransition {
        /// Step index within the path
        index: usize,
        /// Current status
        from: StepStatus,
        /// Requested status
        to: StepStatus,
    },

    /// Step index outside the path.
    #[error("Step index {index} out of range (path has {len} steps)")]
    StepOutOfRange {
        /// Requested index
        index: usize,
        /// Number of steps in the path
        len: usize,
    },

    /// Path lifecycle change not allowed from the current state.
    #[error("Invalid path state change: {from} -> {to}")]
    InvalidPathState {
        /// Current state
        from: PathState,
        /// Requested state
        to: PathState,
    },

    /// Student data store has no profile for this student.
    #[error("Profile not found: {0}")]
    ProfileNotFound(StudentId),

    /// Student has no open learning path.
    #[error("No active learning path for student {0}")]
    NoActivePath(StudentId),

    /// Planning request was cancelled between objectives.
    #[error("Planning cancelled")]
    Cancelled,

    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// External store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by external stores (content store, student data store).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Call exceeded its time limit
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Transport or backend I/O failure
    #[error("I/O failure: {0}")]
    Io(String),

    /// Store is temporarily unavailable
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Query was malformed; retrying will not help
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl StoreError {
    /// Returns true if a retry may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::InvalidQuery(_))
    }
}

/// Result type alias for path generation operations.
pub type Result<T> = std::result::Result<T, PathwayError>;
