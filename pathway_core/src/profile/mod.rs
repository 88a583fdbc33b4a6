//! Student profile model
//!
//! A normalized view of one student: per-objective mastery, learning-style
//! weights derived from recent interaction modalities, and pacing. Profiles
//! are updated incrementally from progress events by [`ProfileModel`].

mod mastery;

pub use mastery::{Mastery, MasteryError};

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{PathwayError, Result};
use crate::types::{Modality, ModalityWeights, ObjectiveId, PathId, StudentId};

/// One observed interaction outcome for an objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub objective_id: ObjectiveId,
    /// Observed score in [0, 1]
    pub score: f64,
    /// Modality the student chose or engaged with, if known
    #[serde(default)]
    pub modality: Option<Modality>,
    pub recorded_at: DateTime<Utc>,
}

impl ProgressEvent {
    pub fn new(objective_id: impl Into<ObjectiveId>, score: f64) -> Self {
        Self {
            objective_id: objective_id.into(),
            score,
            modality: None,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality = Some(modality);
        self
    }

    fn observed(&self) -> Result<Mastery> {
        Mastery::new(self.score).map_err(|e| PathwayError::InvalidProgress {
            objective: self.objective_id.clone(),
            message: e.to_string(),
        })
    }
}

/// Mastery, learning style and pacing of one student.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: StudentId,
    mastery: BTreeMap<ObjectiveId, Mastery>,
    style_observations: VecDeque<Modality>,
    /// Objectives per session
    pub pacing: usize,
    pub active_path_id: Option<PathId>,
    pub updated_at: DateTime<Utc>,
}

impl StudentProfile {
    pub fn new(student_id: impl Into<StudentId>, pacing: usize) -> Self {
        Self {
            student_id: student_id.into(),
            mastery: BTreeMap::new(),
            style_observations: VecDeque::new(),
            pacing: pacing.max(1),
            active_path_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Seeds mastery for an objective (builder pattern).
    pub fn with_mastery(mut self, objective: impl Into<ObjectiveId>, mastery: Mastery) -> Self {
        self.set_mastery(objective, mastery);
        self
    }

    pub fn set_mastery(&mut self, objective: impl Into<ObjectiveId>, mastery: Mastery) {
        self.mastery.insert(objective.into(), mastery);
        self.updated_at = Utc::now();
    }

    /// Mastery for an objective, or `None` when it was never observed.
    ///
    /// `None` is distinct from a known mastery of zero.
    pub fn mastery_of(&self, objective: &ObjectiveId) -> Option<Mastery> {
        self.mastery.get(objective).copied()
    }

    /// All known mastery values, ordered by objective id.
    pub fn mastery(&self) -> impl Iterator<Item = (&ObjectiveId, Mastery)> {
        self.mastery.iter().map(|(id, m)| (id, *m))
    }

    /// Recent modality observations, oldest first.
    pub fn style_observations(&self) -> impl Iterator<Item = &Modality> {
        self.style_observations.iter()
    }
}

/// Applies progress events to profiles and derives learning-style weights.
#[derive(Clone, Debug)]
pub struct ProfileModel {
    alpha: f64,
    window: usize,
    min_observations: usize,
    pacing_default: usize,
}

impl ProfileModel {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            alpha: config.ewma_alpha,
            window: config.style_window.max(1),
            min_observations: config.style_min_observations,
            pacing_default: config.pacing_default.max(1),
        }
    }

    /// Empty profile with the configured default pacing.
    pub fn new_profile(&self, student_id: impl Into<StudentId>) -> StudentProfile {
        StudentProfile::new(student_id, self.pacing_default)
    }

    /// Updates mastery for the event's objective.
    ///
    /// The first observation of an objective seeds its mastery with the
    /// observed score; later ones apply the exponentially weighted update.
    pub fn ingest(&self, profile: &mut StudentProfile, event: &ProgressEvent) -> Result<()> {
        let observed = event.observed()?;
        self.apply(profile, event, observed);
        Ok(())
    }

    /// Applies a batch of events in order.
    ///
    /// Every event is validated before any is applied, so a rejected batch
    /// leaves the profile untouched.
    pub fn ingest_all(&self, profile: &mut StudentProfile, events: &[ProgressEvent]) -> Result<usize> {
        let observed: Vec<Mastery> = events
            .iter()
            .map(ProgressEvent::observed)
            .collect::<Result<_>>()?;
        for (event, value) in events.iter().zip(observed) {
            self.apply(profile, event, value);
        }
        Ok(events.len())
    }

    /// Learning-style weights from the rolling modality window.
    ///
    /// Uniform until the window holds the configured minimum of observations.
    pub fn learning_style_weights(&self, profile: &StudentProfile) -> ModalityWeights {
        let observations = &profile.style_observations;
        if observations.len() < self.min_observations || observations.is_empty() {
            return ModalityWeights::uniform();
        }

        let mut counts = [0.0_f64; 4];
        for modality in observations.iter().rev().take(self.window) {
            if let Some(slot) = Modality::ALL.iter().position(|m| m == modality) {
                counts[slot] += 1.0;
            }
        }
        ModalityWeights::from_raw(counts)
    }

    fn apply(&self, profile: &mut StudentProfile, event: &ProgressEvent, observed: Mastery) {
        let next = match profile.mastery_of(&event.objective_id) {
            Some(previous) => previous.ewma(observed, self.alpha),
            None => observed,
        };
        profile.mastery.insert(event.objective_id.clone(), next);

        if let Some(modality) = event.modality {
            profile.style_observations.push_back(modality);
            while profile.style_observations.len() > self.window {
                profile.style_observations.pop_front();
            }
        }
        profile.updated_at = event.recorded_at.max(profile.updated_at);

        debug!(
            student = %profile.student_id,
            objective = %event.objective_id,
            mastery = next.get(),
            "progress ingested"
        );
    }
}
