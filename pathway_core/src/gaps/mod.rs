//! Gap analysis
//!
//! Finds prerequisites of the requested targets that the student is
//! expected to know but has not demonstrated. A candidate is any
//! transitive prerequisite of a target whose mastery is unset or below the
//! configured threshold.
//!
//! Candidates are split in two:
//! - **gaps**: candidates with no candidate among their own prerequisites,
//!   i.e. the frontier where remediation has to start
//! - **bridges**: candidates sitting downstream of a gap; the student
//!   cannot be expected to know them yet, but the path must still cover
//!   them to reach the targets

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{PathwayError, Result};
use crate::graph::CompetencyGraph;
use crate::profile::StudentProfile;
use crate::types::ObjectiveId;

/// One expected-but-unmastered objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub objective_id: ObjectiveId,
    /// `1 - mastery`, or 1.0 when mastery was never observed
    pub confidence: f64,
    /// Known mastery, `None` when unset
    pub mastery: Option<f64>,
}

/// Result of a gap analysis.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GapReport {
    /// Remediation frontier, in topological order
    pub gaps: Vec<Gap>,
    /// Unmastered objectives downstream of a gap, in topological order
    pub bridges: Vec<ObjectiveId>,
}

impl GapReport {
    /// Ids of the flagged gaps, in report order.
    pub fn objective_ids(&self) -> impl Iterator<Item = &ObjectiveId> {
        self.gaps.iter().map(|gap| &gap.objective_id)
    }

    pub fn contains(&self, id: &ObjectiveId) -> bool {
        self.gaps.iter().any(|gap| &gap.objective_id == id)
    }

    pub fn get(&self, id: &ObjectiveId) -> Option<&Gap> {
        self.gaps.iter().find(|gap| &gap.objective_id == id)
    }

    /// Every objective the planner must add besides the targets.
    pub fn mandatory(&self) -> impl Iterator<Item = &ObjectiveId> {
        self.objective_ids().chain(self.bridges.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.gaps.is_empty() && self.bridges.is_empty()
    }
}

/// Flags unmastered prerequisites of a set of targets.
#[derive(Clone, Debug)]
pub struct GapAnalyzer {
    mastery_threshold: f64,
}

impl GapAnalyzer {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_threshold(config.mastery_threshold)
    }

    pub fn with_threshold(mastery_threshold: f64) -> Self {
        Self { mastery_threshold }
    }

    pub fn mastery_threshold(&self) -> f64 {
        self.mastery_threshold
    }

    /// Analyzes `targets` against the student's mastery.
    ///
    /// Targets themselves are never reported; they are scheduled anyway.
    /// Fails with `UnknownObjective` when a target is not in the graph.
    pub fn analyze(
        &self,
        profile: &StudentProfile,
        graph: &CompetencyGraph,
        targets: &[ObjectiveId],
    ) -> Result<GapReport> {
        let target_set: BTreeSet<&ObjectiveId> = targets.iter().collect();

        let mut prerequisites = BTreeSet::new();
        for target in &target_set {
            prerequisites.extend(graph.ancestors_of(target)?);
        }
        prerequisites.retain(|id| !target_set.contains(id));

        let candidates: BTreeSet<ObjectiveId> = prerequisites
            .into_iter()
            .filter(|id| self.is_unmastered(profile, id))
            .collect();

        let mut frontier = Vec::new();
        let mut bridges = Vec::new();
        for id in &candidates {
            let blocked = graph
                .ancestors_of(id)?
                .iter()
                .any(|ancestor| candidates.contains(ancestor));
            if blocked {
                bridges.push(id.clone());
            } else {
                frontier.push(id.clone());
            }
        }

        let gaps = graph
            .topological_order(&frontier)?
            .into_iter()
            .map(|id| {
                let mastery = profile.mastery_of(&id);
                Gap {
                    confidence: mastery.map(|m| m.deficit()).unwrap_or(1.0),
                    mastery: mastery.map(|m| m.get()),
                    objective_id: id,
                }
            })
            .collect::<Vec<_>>();
        let bridges = graph.topological_order(&bridges)?;

        debug!(
            student = %profile.student_id,
            targets = targets.len(),
            gaps = gaps.len(),
            bridges = bridges.len(),
            "gap analysis complete"
        );
        Ok(GapReport { gaps, bridges })
    }

    fn is_unmastered(&self, profile: &StudentProfile, id: &ObjectiveId) -> bool {
        match profile.mastery_of(id) {
            Some(mastery) => mastery.get() < self.mastery_threshold,
            None => true,
        }
    }
}

impl Default for GapAnalyzer {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

/// Ensures every target is known before analysis starts.
pub(crate) fn check_targets(graph: &CompetencyGraph, targets: &[ObjectiveId]) -> Result<()> {
    match targets.iter().find(|id| !graph.contains(id)) {
        Some(missing) => Err(PathwayError::UnknownObjective(missing.clone())),
        None => Ok(()),
    }
}
