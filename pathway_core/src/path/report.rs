//! Summary of a generated path for presentation and audit.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{LearningPath, SkipReason, StepStatus};
use crate::error::Result;
use crate::graph::CompetencyGraph;
use crate::types::ObjectiveId;

/// Paths planned for less time than this get a warning.
const SHORT_PATH_MINUTES: u32 = 30;
/// Paths with more objectives than this get a warning.
const LONG_PATH_OBJECTIVES: usize = 10;

/// Totals, coverage and warnings for one path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PathReport {
    /// Estimated minutes over non-skipped steps
    pub total_minutes: u32,
    pub subjects: BTreeSet<String>,
    pub session_count: usize,
    pub skipped: Vec<(ObjectiveId, SkipReason)>,
    pub warnings: Vec<String>,
    /// Completed share of non-skipped steps
    pub completion_rate: f64,
}

impl PathReport {
    /// Builds the report; fails if a step names an objective missing from
    /// `graph`.
    pub fn build(path: &LearningPath, graph: &CompetencyGraph) -> Result<Self> {
        let mut total_minutes = 0u32;
        let mut subjects = BTreeSet::new();
        let mut skipped = Vec::new();

        for step in &path.steps {
            let objective = graph.get(&step.objective_id)?;
            if step.status == StepStatus::Skipped {
                let reason = step.skip_reason.clone().unwrap_or(SkipReason::Dismissed);
                skipped.push((step.objective_id.clone(), reason));
                continue;
            }
            total_minutes = total_minutes.saturating_add(objective.estimated_duration_minutes);
            subjects.insert(objective.subject.clone());
        }

        let planned = path.non_skipped_count();
        let completed = path.count_with_status(StepStatus::Completed);
        let completion_rate = if planned == 0 {
            0.0
        } else {
            completed as f64 / planned as f64
        };

        let mut warnings = Vec::new();
        if total_minutes < SHORT_PATH_MINUTES {
            warnings.push(format!("Total duration is very short ({total_minutes} min)"));
        }
        if subjects.len() == 1 {
            warnings.push("Path covers only one subject".to_string());
        }
        if planned > LONG_PATH_OBJECTIVES {
            warnings.push(format!("Many objectives ({planned})"));
        }
        for (objective, reason) in &skipped {
            warnings.push(format!("Objective {objective} skipped: {reason}"));
        }

        Ok(Self {
            total_minutes,
            subjects,
            session_count: path.sessions().len(),
            skipped,
            warnings,
            completion_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LearningObjective, ObjectiveBounds};
    use crate::path::{PathState, PathStep};
    use crate::types::{ContentId, PathId, StudentId};
    use chrono::Utc;

    fn graph() -> CompetencyGraph {
        CompetencyGraph::from_objectives(
            vec![
                LearningObjective::new("a", "math", "a", 1, 20),
                LearningObjective::new("b", "math", "b", 2, 25).requires("a"),
                LearningObjective::new("p", "physics", "p", 3, 40).requires("b"),
            ],
            ObjectiveBounds::default(),
        )
        .unwrap()
    }

    fn step(id: &str, status: StepStatus, session: Option<usize>) -> PathStep {
        PathStep {
            objective_id: ObjectiveId::new(id),
            content_ids: vec![ContentId::new("c")],
            scores: vec![0.5],
            status,
            skip_reason: None,
            session,
        }
    }

    fn path(steps: Vec<PathStep>) -> LearningPath {
        LearningPath {
            id: PathId::new(),
            student_id: StudentId::new("s1"),
            version: 1,
            previous: None,
            targets: vec![ObjectiveId::new("p")],
            state: PathState::Active,
            steps,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_totals_and_completion() {
        let path = path(vec![
            step("a", StepStatus::Completed, Some(0)),
            step("b", StepStatus::InProgress, Some(0)),
            step("p", StepStatus::Pending, Some(1)),
        ]);
        let report = PathReport::build(&path, &graph()).unwrap();
        assert_eq!(report.total_minutes, 85);
        assert_eq!(report.subjects.len(), 2);
        assert_eq!(report.session_count, 2);
        assert!((report.completion_rate - 1.0 / 3.0).abs() < 1e-12);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_warnings_for_short_single_subject_path() {
        let path = path(vec![
            step("a", StepStatus::Pending, Some(0)),
            PathStep::skipped(ObjectiveId::new("b"), SkipReason::NoMatches),
        ]);
        let report = PathReport::build(&path, &graph()).unwrap();
        assert_eq!(report.total_minutes, 20);
        assert_eq!(report.skipped, vec![(ObjectiveId::new("b"), SkipReason::NoMatches)]);
        assert_eq!(report.warnings.len(), 3);
        assert!(report.warnings.iter().any(|w| w.contains("very short")));
        assert!(report.warnings.iter().any(|w| w.contains("only one subject")));
        assert!(report.warnings.iter().any(|w| w.contains("no matching content")));
    }
}
