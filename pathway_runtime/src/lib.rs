//! Pathway runtime layer - per-student planning service.
//!
//! Wraps a [`PathPlanner`] and a [`StudentStore`] into a service that can
//! be shared across tasks:
//!
//! - Requests for the same student are serialized on a per-student lock
//! - Requests for different students run in parallel
//! - Every path version is persisted; profiles follow progress events
//! - Counters and planning time are collected in [`RuntimeMetrics`]

pub mod locks;
pub mod metrics;

pub use locks::StudentLocks;
pub use metrics::{MetricKind, MetricsSummary, RuntimeMetrics};

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use pathway_core::{
    CancellationToken, CompetencyGraph, ContentStore, EngineConfig, LearningPath, ObjectiveId,
    PathPlanner, PathReport, PathState, PathwayError, ProgressEvent, Result, StepStatus,
    StudentId, StudentProfile, StudentStore,
};
use tracing::{debug, info};

/// Reads and validates an engine configuration file.
pub fn load_config(path: impl AsRef<Path>) -> anyhow::Result<EngineConfig> {
    let path = path.as_ref();
    EngineConfig::load(path)
        .with_context(|| format!("failed to load engine config from {}", path.display()))
}

/// Planning entry point for the presentation layer.
pub struct PlanningService {
    planner: Arc<PathPlanner>,
    store: Arc<dyn StudentStore>,
    locks: StudentLocks,
    metrics: RuntimeMetrics,
}

impl PlanningService {
    pub fn new(planner: Arc<PathPlanner>, store: Arc<dyn StudentStore>) -> Self {
        Self {
            planner,
            store,
            locks: StudentLocks::new(),
            metrics: RuntimeMetrics::new(),
        }
    }

    /// Builds a service from a configuration file and its collaborators.
    pub fn from_config_file(
        config_path: impl AsRef<Path>,
        graph: Arc<CompetencyGraph>,
        content: Arc<dyn ContentStore>,
        store: Arc<dyn StudentStore>,
    ) -> anyhow::Result<Self> {
        let config = load_config(config_path)?;
        let planner = PathPlanner::new(graph, content, &config);
        info!(version = pathway_core::VERSION, "planning service configured");
        Ok(Self::new(Arc::new(planner), store))
    }

    pub fn planner(&self) -> &PathPlanner {
        &self.planner
    }

    pub fn metrics(&self) -> &RuntimeMetrics {
        &self.metrics
    }

    /// Generates a new path and makes it the student's active path.
    ///
    /// A previously active path is abandoned and linked as `previous`.
    /// Unknown students start from an empty profile.
    pub async fn generate_path(
        &self,
        student: &StudentId,
        targets: &[ObjectiveId],
        token: &CancellationToken,
    ) -> Result<LearningPath> {
        let _guard = self.locks.lock(student).await;
        let mut profile = self.load_or_create(student).await?;

        let started = Instant::now();
        let result = self.planner.generate(&profile, targets, token).await;
        self.metrics.record_planning_time(started.elapsed());
        let mut path = self.observe(result, MetricKind::PathGenerated)?;

        if let Some(mut previous) = self.store.load_active_path(student).await? {
            previous.abandon()?;
            self.store.save_path(&previous).await?;
            path.previous = Some(previous.id);
            debug!(student = %student, previous = %previous.id, "previous path abandoned");
        }

        self.store.save_path(&path).await?;
        profile.active_path_id = Some(path.id);
        self.store.save_profile(&profile).await?;
        Ok(path)
    }

    /// Records progress and re-plans the active path.
    ///
    /// Returns the new path version, or `None` when the student has no
    /// active path (the profile is still updated). Events are persisted
    /// even if re-planning fails afterwards, since the student did make
    /// that progress.
    pub async fn record_progress(
        &self,
        student: &StudentId,
        events: &[ProgressEvent],
        token: &CancellationToken,
    ) -> Result<Option<LearningPath>> {
        let _guard = self.locks.lock(student).await;
        let mut profile = self.load_or_create(student).await?;

        let Some(mut active) = self.store.load_active_path(student).await? else {
            self.planner.profile_model().ingest_all(&mut profile, events)?;
            self.persist_progress(student, &profile, events).await?;
            return Ok(None);
        };

        let started = Instant::now();
        let result = self.planner.replan(&active, &mut profile, events, token).await;
        self.metrics.record_planning_time(started.elapsed());

        let result = match result {
            // rejected before any event was applied
            Err(err @ (PathwayError::InvalidProgress { .. } | PathwayError::InvalidPathState { .. })) => {
                return Err(err)
            }
            other => other,
        };

        let outcome = self.observe(result, MetricKind::Replan);
        if let Ok(path) = &outcome {
            // superseded version leaves the active slot before the new one lands
            active.abandon()?;
            self.store.save_path(&active).await?;
            self.store.save_path(path).await?;
            profile.active_path_id = if path.state.is_closed() {
                info!(student = %student, path = %path.id, "learning path completed");
                None
            } else {
                Some(path.id)
            };
        }
        self.persist_progress(student, &profile, events).await?;
        outcome.map(Some)
    }

    /// Changes a step status on the active path and persists it.
    pub async fn mark_step(
        &self,
        student: &StudentId,
        index: usize,
        status: StepStatus,
    ) -> Result<LearningPath> {
        let _guard = self.locks.lock(student).await;
        let mut path = self
            .store
            .load_active_path(student)
            .await?
            .ok_or_else(|| PathwayError::NoActivePath(student.clone()))?;

        path.mark_step_status(index, status)?;
        self.store.save_path(&path).await?;

        if path.state == PathState::Completed {
            info!(student = %student, path = %path.id, "learning path completed");
            match self.store.load_profile(student).await {
                Ok(mut profile) => {
                    profile.active_path_id = None;
                    self.store.save_profile(&profile).await?;
                }
                Err(PathwayError::ProfileNotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(path)
    }

    pub async fn active_path(&self, student: &StudentId) -> Result<Option<LearningPath>> {
        self.store.load_active_path(student).await
    }

    /// Every path version for the student, oldest first.
    pub async fn history(&self, student: &StudentId) -> Result<Vec<LearningPath>> {
        self.store.path_history(student).await
    }

    /// Path history as pretty-printed JSON, for audit export.
    pub async fn history_json(&self, student: &StudentId) -> Result<String> {
        let history = self.history(student).await?;
        Ok(serde_json::to_string_pretty(&history)?)
    }

    /// Summary of the active path, if any.
    pub async fn active_report(&self, student: &StudentId) -> Result<Option<PathReport>> {
        match self.active_path(student).await? {
            Some(path) => Ok(Some(self.planner.report(&path)?)),
            None => Ok(None),
        }
    }

    async fn load_or_create(&self, student: &StudentId) -> Result<StudentProfile> {
        match self.store.load_profile(student).await {
            Ok(profile) => Ok(profile),
            Err(PathwayError::ProfileNotFound(_)) => {
                debug!(student = %student, "creating profile");
                Ok(self.planner.profile_model().new_profile(student.clone()))
            }
            Err(err) => Err(err),
        }
    }

    async fn persist_progress(
        &self,
        student: &StudentId,
        profile: &StudentProfile,
        events: &[ProgressEvent],
    ) -> Result<()> {
        for event in events {
            self.store.append_progress_event(student, event).await?;
        }
        self.store.save_profile(profile).await
    }

    fn observe(&self, result: Result<LearningPath>, kind: MetricKind) -> Result<LearningPath> {
        match &result {
            Ok(path) => {
                self.metrics.record(kind);
                self.metrics
                    .record_n(MetricKind::StepSkipped, path.count_with_status(StepStatus::Skipped) as u64);
            }
            Err(PathwayError::EmptyPath) => self.metrics.record(MetricKind::EmptyPath),
            Err(PathwayError::Cancelled) => self.metrics.record(MetricKind::Cancelled),
            Err(_) => {}
        }
        result
    }
}
