//! Path generation and re-planning.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{LearningPath, PathReport, PathState, PathStep, SkipReason, StepStatus};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::error::{PathwayError, Result};
use crate::gaps::{check_targets, GapAnalyzer, GapReport};
use crate::graph::CompetencyGraph;
use crate::profile::{ProfileModel, ProgressEvent, StudentProfile};
use crate::retrieval::{ContentStore, RetrievalScorer};
use crate::types::{ObjectiveId, PathId};

/// Turns a profile, the competency graph and ranked content into paths.
pub struct PathPlanner {
    graph: Arc<CompetencyGraph>,
    scorer: RetrievalScorer,
    gap_analyzer: GapAnalyzer,
    profile_model: ProfileModel,
    top_k: usize,
}

impl PathPlanner {
    pub fn new(graph: Arc<CompetencyGraph>, store: Arc<dyn ContentStore>, config: &EngineConfig) -> Self {
        Self {
            graph,
            scorer: RetrievalScorer::new(store, config),
            gap_analyzer: GapAnalyzer::new(config),
            profile_model: ProfileModel::new(config),
            top_k: config.top_k_candidates.max(1),
        }
    }

    /// Replaces the scorer (builder pattern)
    pub fn with_scorer(mut self, scorer: RetrievalScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn graph(&self) -> &CompetencyGraph {
        &self.graph
    }

    pub fn profile_model(&self) -> &ProfileModel {
        &self.profile_model
    }

    pub fn analyze_gaps(&self, profile: &StudentProfile, targets: &[ObjectiveId]) -> Result<GapReport> {
        self.gap_analyzer.analyze(profile, &self.graph, targets)
    }

    pub fn report(&self, path: &LearningPath) -> Result<PathReport> {
        PathReport::build(path, &self.graph)
    }

    /// Plans a fresh path toward `targets`.
    ///
    /// Unmastered prerequisites found by gap analysis are scheduled along
    /// with the targets. Objectives without usable content become skipped
    /// steps; the call only fails when nothing could be resolved.
    pub async fn generate(
        &self,
        profile: &StudentProfile,
        targets: &[ObjectiveId],
        token: &CancellationToken,
    ) -> Result<LearningPath> {
        let targets = dedup(targets);
        if targets.is_empty() {
            return Err(PathwayError::EmptyPath);
        }
        check_targets(&self.graph, &targets)?;

        let mut steps = self
            .plan_steps(profile, &targets, &BTreeSet::new(), token)
            .await?;
        assign_sessions(&mut steps, profile.pacing, 0);

        let mut path = LearningPath {
            id: PathId::new(),
            student_id: profile.student_id.clone(),
            version: 1,
            previous: None,
            targets,
            state: PathState::Draft,
            steps,
            created_at: Utc::now(),
        };
        validate(&mut path)?;

        info!(
            student = %path.student_id,
            path = %path.id,
            steps = path.steps.len(),
            skipped = path.count_with_status(StepStatus::Skipped),
            fingerprint = %path.fingerprint(),
            "learning path generated"
        );
        Ok(path)
    }

    /// Applies progress events and re-plans the unstarted part of a path.
    ///
    /// Steps already `in_progress` or `completed` are kept unchanged at
    /// the front of the new version. Unstarted steps those kept steps
    /// depend on stay in place as skipped with [`SkipReason::Bypassed`],
    /// so they are neither scheduled again nor lost. The rest is planned
    /// again for the targets not started yet.
    pub async fn replan(
        &self,
        existing: &LearningPath,
        profile: &mut StudentProfile,
        events: &[ProgressEvent],
        token: &CancellationToken,
    ) -> Result<LearningPath> {
        if existing.state.is_closed() {
            return Err(PathwayError::InvalidPathState {
                from: existing.state,
                to: PathState::Active,
            });
        }
        self.profile_model.ingest_all(profile, events)?;

        let retained_ids: BTreeSet<ObjectiveId> = existing
            .steps
            .iter()
            .filter(|step| step.status.is_started())
            .map(|step| step.objective_id.clone())
            .collect();

        // ancestor -> first started step that depends on it
        let mut exclude = retained_ids.clone();
        let mut bypassed_by: HashMap<ObjectiveId, ObjectiveId> = HashMap::new();
        for step in existing.steps.iter().filter(|s| s.status.is_started()) {
            for ancestor in self.graph.ancestors_of(&step.objective_id)? {
                bypassed_by
                    .entry(ancestor.clone())
                    .or_insert_with(|| step.objective_id.clone());
                exclude.insert(ancestor);
            }
        }

        let mut retained = Vec::new();
        for step in &existing.steps {
            if step.status.is_started() {
                retained.push(step.clone());
            } else if let Some(by) = bypassed_by.get(&step.objective_id) {
                if step.status == StepStatus::Skipped {
                    retained.push(step.clone());
                } else {
                    debug!(objective = %step.objective_id, by = %by, "pending step bypassed");
                    retained.push(PathStep::skipped(
                        step.objective_id.clone(),
                        SkipReason::Bypassed { by: by.clone() },
                    ));
                }
            }
        }

        let remaining: Vec<ObjectiveId> = existing
            .targets
            .iter()
            .filter(|id| !retained_ids.contains(*id))
            .cloned()
            .collect();

        let mut planned = if remaining.is_empty() {
            Vec::new()
        } else {
            self.plan_steps(profile, &remaining, &exclude, token).await?
        };
        let next_session = retained
            .iter()
            .filter_map(|step| step.session)
            .max()
            .map_or(0, |last| last + 1);
        assign_sessions(&mut planned, profile.pacing, next_session);

        let mut steps = retained;
        steps.extend(planned);

        let mut path = LearningPath {
            id: PathId::new(),
            student_id: existing.student_id.clone(),
            version: existing.version + 1,
            previous: Some(existing.id),
            targets: existing.targets.clone(),
            state: PathState::Draft,
            steps,
            created_at: Utc::now(),
        };
        validate(&mut path)?;
        if existing.state == PathState::Active {
            path.state = PathState::Active;
        }
        let all_terminal = path.steps.iter().all(|s| s.status.is_terminal());
        if all_terminal && path.count_with_status(StepStatus::Completed) > 0 {
            path.state = PathState::Completed;
        }

        info!(
            student = %path.student_id,
            path = %path.id,
            previous = %existing.id,
            version = path.version,
            retained = retained_ids.len(),
            bypassed = path
                .steps
                .iter()
                .filter(|s| matches!(s.skip_reason, Some(SkipReason::Bypassed { .. })))
                .count(),
            steps = path.steps.len(),
            fingerprint = %path.fingerprint(),
            "learning path re-planned"
        );
        Ok(path)
    }

    /// Gap analysis, ordering and content ranking for one request.
    async fn plan_steps(
        &self,
        profile: &StudentProfile,
        targets: &[ObjectiveId],
        exclude: &BTreeSet<ObjectiveId>,
        token: &CancellationToken,
    ) -> Result<Vec<PathStep>> {
        let report = self.gap_analyzer.analyze(profile, &self.graph, targets)?;

        let mut wanted: BTreeSet<&ObjectiveId> = targets.iter().collect();
        wanted.extend(report.mandatory());
        wanted.retain(|id| !exclude.contains(*id));
        let order = self.graph.topological_order(wanted.iter().copied())?;

        debug!(
            student = %profile.student_id,
            gaps = report.gaps.len(),
            bridges = report.bridges.len(),
            objectives = order.len(),
            "objective order computed"
        );

        let mut steps = Vec::with_capacity(order.len());
        for id in order {
            if token.is_cancelled() {
                info!(student = %profile.student_id, planned = steps.len(), "planning cancelled");
                return Err(PathwayError::Cancelled);
            }
            let objective = self.graph.get(&id)?;

            let ranked = tokio::select! {
                biased;
                _ = token.wait_cancelled() => {
                    info!(student = %profile.student_id, planned = steps.len(), "planning cancelled");
                    return Err(PathwayError::Cancelled);
                }
                ranked = self.scorer.rank(objective, profile, self.top_k) => ranked,
            };

            match ranked {
                Ok(ranked) => steps.push(PathStep {
                    objective_id: id,
                    content_ids: ranked.iter().map(|c| c.content_id.clone()).collect(),
                    scores: ranked.iter().map(|c| c.score).collect(),
                    status: StepStatus::Pending,
                    skip_reason: None,
                    session: None,
                }),
                Err(PathwayError::NoCandidates { objective, reason }) => {
                    warn!(student = %profile.student_id, %objective, %reason, "objective skipped");
                    steps.push(PathStep::skipped(objective, reason));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(steps)
    }
}

/// Removes repeated targets, keeping the first occurrence.
fn dedup(targets: &[ObjectiveId]) -> Vec<ObjectiveId> {
    let mut seen = BTreeSet::new();
    targets
        .iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}

/// Groups non-skipped steps into sessions of `pacing` objectives.
///
/// Order is unchanged; skipped steps get no session.
fn assign_sessions(steps: &mut [PathStep], pacing: usize, first_session: usize) {
    let pacing = pacing.max(1);
    let mut scheduled = 0;
    for step in steps.iter_mut() {
        if step.status == StepStatus::Skipped {
            step.session = None;
            continue;
        }
        step.session = Some(first_session + scheduled / pacing);
        scheduled += 1;
    }
}

/// Draft -> Validated once every non-skipped step has content.
fn validate(path: &mut LearningPath) -> Result<()> {
    if path.non_skipped_count() == 0 {
        return Err(PathwayError::EmptyPath);
    }
    let missing = path
        .steps
        .iter()
        .find(|step| step.status != StepStatus::Skipped && step.content_ids.is_empty());
    if let Some(step) = missing {
        return Err(PathwayError::InvalidObjective {
            objective: step.objective_id.clone(),
            message: "scheduled step has no content".to_string(),
        });
    }
    path.state = PathState::Validated;
    Ok(())
}
