//! Learning paths and their lifecycle
//!
//! A [`LearningPath`] is an ordered list of [`PathStep`]s for one student.
//! Paths are produced by the [`PathPlanner`]; re-planning creates a new
//! version instead of rewriting the old one.
//!
//! Path lifecycle: `Draft -> Validated -> Active -> {Completed, Abandoned}`.
//! Step lifecycle: `pending -> in_progress -> completed`, and any
//! non-terminal step may become `skipped`.

mod planner;
mod report;

pub use planner::PathPlanner;
pub use report::PathReport;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PathwayError, Result};
use crate::types::{ContentId, ObjectiveId, PathId, StudentId};

/// Status of one path step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl StepStatus {
    /// Check if a status transition is valid
    pub fn can_transition_to(&self, next: &StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::InProgress)
                | (StepStatus::InProgress, StepStatus::Completed)
                | (StepStatus::Pending, StepStatus::Skipped)
                | (StepStatus::InProgress, StepStatus::Skipped)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }

    /// Started steps are never changed by re-planning.
    pub fn is_started(&self) -> bool {
        matches!(self, StepStatus::InProgress | StepStatus::Completed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of a whole path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathState {
    Draft,
    Validated,
    Active,
    Completed,
    Abandoned,
}

impl PathState {
    pub fn is_closed(&self) -> bool {
        matches!(self, PathState::Completed | PathState::Abandoned)
    }
}

impl fmt::Display for PathState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PathState::Draft => "draft",
            PathState::Validated => "validated",
            PathState::Active => "active",
            PathState::Completed => "completed",
            PathState::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// Why a step was skipped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Content store returned no candidates
    NoMatches,
    /// Every attempt hit the per-call timeout
    TimedOut { attempts: u32 },
    /// Content store kept failing until retries ran out
    StoreFailure { message: String },
    /// Student chose to skip the step
    Dismissed,
    /// A later step that depends on it was started first
    Bypassed { by: ObjectiveId },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoMatches => write!(f, "no matching content was found"),
            SkipReason::TimedOut { attempts } => {
                write!(f, "content lookup timed out after {attempts} attempts")
            }
            SkipReason::StoreFailure { message } => {
                write!(f, "content lookup failed: {message}")
            }
            SkipReason::Dismissed => write!(f, "skipped by the student"),
            SkipReason::Bypassed { by } => write!(f, "bypassed when {by} was started"),
        }
    }
}

/// One scheduled objective with its chosen content.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub objective_id: ObjectiveId,
    /// Chosen content, best first; empty only for skipped steps
    pub content_ids: Vec<ContentId>,
    /// Composite score of each chosen chunk, aligned with `content_ids`
    pub scores: Vec<f64>,
    pub status: StepStatus,
    pub skip_reason: Option<SkipReason>,
    /// Session number (0-based); `None` for skipped steps
    pub session: Option<usize>,
}

impl PathStep {
    pub(crate) fn skipped(objective_id: ObjectiveId, reason: SkipReason) -> Self {
        Self {
            objective_id,
            content_ids: Vec::new(),
            scores: Vec::new(),
            status: StepStatus::Skipped,
            skip_reason: Some(reason),
            session: None,
        }
    }
}

/// Ordered learning activities for one student.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningPath {
    pub id: PathId,
    pub student_id: StudentId,
    /// 1 for a fresh path, incremented on every re-plan
    pub version: u32,
    /// Path this version replaced
    pub previous: Option<PathId>,
    pub targets: Vec<ObjectiveId>,
    pub state: PathState,
    pub steps: Vec<PathStep>,
    pub created_at: DateTime<Utc>,
}

/// Fields covered by the fingerprint.
#[derive(Serialize)]
struct StepForHash<'a> {
    objective_id: &'a ObjectiveId,
    content_ids: &'a [ContentId],
    status: StepStatus,
    session: Option<usize>,
}

impl LearningPath {
    /// Changes one step's status, forward only.
    ///
    /// The first step started activates a validated path; the path
    /// completes once every step is terminal and at least one was
    /// completed.
    pub fn mark_step_status(&mut self, index: usize, status: StepStatus) -> Result<()> {
        if self.state.is_closed() || self.state == PathState::Draft {
            return Err(PathwayError::InvalidPathState {
                from: self.state,
                to: PathState::Active,
            });
        }

        let len = self.steps.len();
        let step = self
            .steps
            .get_mut(index)
            .ok_or(PathwayError::StepOutOfRange { index, len })?;

        if !step.status.can_transition_to(&status) {
            return Err(PathwayError::InvalidTransition {
                index,
                from: step.status,
                to: status,
            });
        }

        step.status = status;
        if status == StepStatus::Skipped {
            step.skip_reason = Some(SkipReason::Dismissed);
        }

        if status == StepStatus::InProgress && self.state == PathState::Validated {
            self.state = PathState::Active;
        }
        let all_terminal = self.steps.iter().all(|s| s.status.is_terminal());
        let any_completed = self.steps.iter().any(|s| s.status == StepStatus::Completed);
        if all_terminal && any_completed {
            self.state = PathState::Completed;
        }
        Ok(())
    }

    /// Validated -> Active.
    pub fn activate(&mut self) -> Result<()> {
        self.transition(PathState::Active, &[PathState::Validated])
    }

    /// Validated or Active -> Abandoned.
    pub fn abandon(&mut self) -> Result<()> {
        self.transition(
            PathState::Abandoned,
            &[PathState::Validated, PathState::Active],
        )
    }

    fn transition(&mut self, to: PathState, allowed_from: &[PathState]) -> Result<()> {
        if !allowed_from.contains(&self.state) {
            return Err(PathwayError::InvalidPathState { from: self.state, to });
        }
        self.state = to;
        Ok(())
    }

    /// Objective ids grouped by session, in path order.
    pub fn sessions(&self) -> Vec<Vec<&ObjectiveId>> {
        let mut sessions: Vec<Vec<&ObjectiveId>> = Vec::new();
        for step in &self.steps {
            if let Some(session) = step.session {
                if sessions.len() <= session {
                    sessions.resize_with(session + 1, Vec::new);
                }
                sessions[session].push(&step.objective_id);
            }
        }
        sessions
    }

    /// Objective ids in path order.
    pub fn objective_order(&self) -> Vec<&ObjectiveId> {
        self.steps.iter().map(|step| &step.objective_id).collect()
    }

    pub fn position_of(&self, objective: &ObjectiveId) -> Option<usize> {
        self.steps.iter().position(|step| &step.objective_id == objective)
    }

    pub fn non_skipped_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status != StepStatus::Skipped)
            .count()
    }

    pub fn count_with_status(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|step| step.status == status).count()
    }

    /// SHA-256 over objective order, content selection, statuses and
    /// sessions.
    ///
    /// Ids, versions and timestamps are left out, so two generations from
    /// identical inputs share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let steps: Vec<StepForHash<'_>> = self
            .steps
            .iter()
            .map(|step| StepForHash {
                objective_id: &step.objective_id,
                content_ids: &step.content_ids,
                status: step.status,
                session: step.session,
            })
            .collect();

        let json = serde_json::to_vec(&steps).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&json);
        format!("{:x}", hasher.finalize())
    }
}
