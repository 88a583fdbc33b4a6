//! Learning objective data model and validation bounds.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{PathwayError, Result};
use crate::types::{Modality, ObjectiveId};

/// An atomic learning goal with prerequisites and a target difficulty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LearningObjective {
    pub id: ObjectiveId,
    pub subject: String,
    pub description: String,
    /// Objectives that must be learned first
    #[serde(default)]
    pub prerequisite_ids: BTreeSet<ObjectiveId>,
    /// Ordinal difficulty (default scale 1-5)
    pub target_difficulty: u8,
    pub estimated_duration_minutes: u32,
    #[serde(default)]
    pub modality_tags: BTreeSet<Modality>,
}

impl LearningObjective {
    /// Creates an objective with no prerequisites and no modality tags.
    pub fn new(
        id: impl Into<ObjectiveId>,
        subject: impl Into<String>,
        description: impl Into<String>,
        target_difficulty: u8,
        estimated_duration_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            description: description.into(),
            prerequisite_ids: BTreeSet::new(),
            target_difficulty,
            estimated_duration_minutes,
            modality_tags: BTreeSet::new(),
        }
    }

    /// Adds a prerequisite (builder pattern).
    pub fn requires(mut self, prerequisite: impl Into<ObjectiveId>) -> Self {
        self.prerequisite_ids.insert(prerequisite.into());
        self
    }

    /// Adds a modality tag (builder pattern).
    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality_tags.insert(modality);
        self
    }
}

/// Limits an objective must satisfy to enter a competency graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectiveBounds {
    pub min_difficulty: u8,
    pub max_difficulty: u8,
    pub min_minutes: u32,
    pub max_minutes: u32,
}

impl ObjectiveBounds {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            min_difficulty: config.min_difficulty,
            max_difficulty: config.max_difficulty,
            min_minutes: config.min_objective_minutes,
            max_minutes: config.max_objective_minutes,
        }
    }

    /// Validates a single objective in isolation (no graph context).
    pub fn check(&self, objective: &LearningObjective) -> Result<()> {
        let invalid = |message: String| PathwayError::InvalidObjective {
            objective: objective.id.clone(),
            message,
        };

        if objective.id.as_str().trim().is_empty() {
            return Err(invalid("objective id must not be empty".to_string()));
        }
        if !(self.min_difficulty..=self.max_difficulty).contains(&objective.target_difficulty) {
            return Err(invalid(format!(
                "target difficulty {} outside {}..={}",
                objective.target_difficulty, self.min_difficulty, self.max_difficulty
            )));
        }
        if !(self.min_minutes..=self.max_minutes).contains(&objective.estimated_duration_minutes) {
            return Err(invalid(format!(
                "estimated duration {} min outside {}..={}",
                objective.estimated_duration_minutes, self.min_minutes, self.max_minutes
            )));
        }
        if objective.prerequisite_ids.contains(&objective.id) {
            return Err(PathwayError::Cycle {
                objective: objective.id.clone(),
                via: vec![objective.id.clone(), objective.id.clone()],
            });
        }
        Ok(())
    }
}

impl Default for ObjectiveBounds {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
