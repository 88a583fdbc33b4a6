//! Relevance and pedagogical-fit score fusion.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::retry::{execute_with_retry, RetryConfig};
use super::{Candidate, ContentQuery, ContentStore};
use crate::config::{EngineConfig, ScoreWeights};
use crate::error::{PathwayError, Result, StoreError};
use crate::graph::LearningObjective;
use crate::path::SkipReason;
use crate::profile::{ProfileModel, StudentProfile};
use crate::types::{ContentId, ModalityWeights};

/// Prerequisite readiness below this shifts the desired difficulty down.
const LOW_READINESS: f64 = 0.4;
/// Prerequisite readiness above this shifts the desired difficulty up.
const HIGH_READINESS: f64 = 0.85;

/// Individual factors of a composite score, each in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub similarity: f64,
    pub difficulty_fit: f64,
    pub modality_fit: f64,
    pub total: f64,
}

/// A scored candidate chosen for an objective.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub content_id: ContentId,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Fuses store similarity with difficulty and modality fit.
pub struct RetrievalScorer {
    store: Arc<dyn ContentStore>,
    weights: ScoreWeights,
    retry: RetryConfig,
    profile_model: ProfileModel,
    min_difficulty: u8,
    max_difficulty: u8,
    difficulty_span: f64,
    adaptive_difficulty: bool,
}

impl RetrievalScorer {
    pub fn new(store: Arc<dyn ContentStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            weights: config.score_weights,
            retry: RetryConfig::from_engine(config),
            profile_model: ProfileModel::new(config),
            min_difficulty: config.min_difficulty,
            max_difficulty: config.max_difficulty,
            difficulty_span: config.difficulty_span(),
            adaptive_difficulty: config.adaptive_difficulty,
        }
    }

    /// Override retry behavior (builder pattern)
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Composite score of one candidate for one objective, in [0, 1].
    pub fn score(
        &self,
        candidate: &Candidate,
        objective: &LearningObjective,
        profile: &StudentProfile,
    ) -> f64 {
        let style = self.profile_model.learning_style_weights(profile);
        let desired = self.desired_difficulty(objective, profile);
        self.breakdown(candidate, desired, &style).total
    }

    /// Queries the store for an objective and returns the best `top_k`
    /// candidates, score descending, ties broken by lowest content id.
    ///
    /// Zero matches, timeouts and exhausted retries all surface as
    /// `NoCandidates` with the matching [`SkipReason`].
    pub async fn rank(
        &self,
        objective: &LearningObjective,
        profile: &StudentProfile,
        top_k: usize,
    ) -> Result<Vec<RankedCandidate>> {
        let top_k = top_k.max(1);
        let query = ContentQuery {
            subject: objective.subject.clone(),
            tags: vec![objective.id.clone()],
            text: objective.description.clone(),
            limit: top_k.saturating_mul(4).max(10),
        };

        let store = Arc::clone(&self.store);
        let outcome = execute_with_retry(|| store.query(&query), &self.retry).await;

        let candidates = match outcome.result {
            Ok(candidates) => candidates,
            Err(StoreError::Timeout(limit)) => {
                warn!(objective = %objective.id, attempts = outcome.attempts, ?limit, "content store timed out");
                return Err(PathwayError::NoCandidates {
                    objective: objective.id.clone(),
                    reason: SkipReason::TimedOut { attempts: outcome.attempts },
                });
            }
            Err(err) => {
                warn!(objective = %objective.id, attempts = outcome.attempts, error = %err, "content store failed");
                return Err(PathwayError::NoCandidates {
                    objective: objective.id.clone(),
                    reason: SkipReason::StoreFailure { message: err.to_string() },
                });
            }
        };

        if candidates.is_empty() {
            return Err(PathwayError::NoCandidates {
                objective: objective.id.clone(),
                reason: SkipReason::NoMatches,
            });
        }

        let style = self.profile_model.learning_style_weights(profile);
        let desired = self.desired_difficulty(objective, profile);

        // A store may return the same chunk twice; keep its best score.
        let mut best: HashMap<ContentId, RankedCandidate> = HashMap::new();
        for candidate in &candidates {
            let breakdown = self.breakdown(candidate, desired, &style);
            let ranked = RankedCandidate {
                content_id: candidate.chunk.id.clone(),
                score: breakdown.total,
                breakdown,
            };
            match best.get(&ranked.content_id) {
                Some(existing) if existing.score >= ranked.score => {}
                _ => {
                    best.insert(ranked.content_id.clone(), ranked);
                }
            }
        }

        let mut ranked: Vec<RankedCandidate> = best.into_values().collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.content_id.cmp(&b.content_id))
        });
        ranked.truncate(top_k);

        debug!(
            objective = %objective.id,
            returned = candidates.len(),
            chosen = ranked.len(),
            "candidates ranked"
        );
        Ok(ranked)
    }

    fn breakdown(&self, candidate: &Candidate, desired: f64, style: &ModalityWeights) -> ScoreBreakdown {
        let similarity = normalize_similarity(candidate.similarity);
        let distance = (f64::from(candidate.chunk.difficulty) - desired).abs();
        let difficulty_fit = (1.0 - distance / self.difficulty_span).clamp(0.0, 1.0);
        let modality_fit = style.dot_indicator(&candidate.chunk.modality_tags).clamp(0.0, 1.0);

        let w = &self.weights;
        let total_weight = w.total();
        let total = if total_weight > 0.0 {
            (w.similarity * similarity + w.difficulty * difficulty_fit + w.modality * modality_fit)
                / total_weight
        } else {
            0.0
        };

        ScoreBreakdown {
            similarity,
            difficulty_fit,
            modality_fit,
            total: total.clamp(0.0, 1.0),
        }
    }

    /// Target difficulty, optionally shifted one step by prerequisite readiness.
    fn desired_difficulty(&self, objective: &LearningObjective, profile: &StudentProfile) -> f64 {
        let target = f64::from(objective.target_difficulty);
        if !self.adaptive_difficulty || objective.prerequisite_ids.is_empty() {
            return target;
        }

        let readiness = objective
            .prerequisite_ids
            .iter()
            .map(|id| profile.mastery_of(id).map(|m| m.get()).unwrap_or(0.0))
            .sum::<f64>()
            / objective.prerequisite_ids.len() as f64;

        let shifted = if readiness < LOW_READINESS {
            target - 1.0
        } else if readiness > HIGH_READINESS {
            target + 1.0
        } else {
            target
        };
        shifted.clamp(f64::from(self.min_difficulty), f64::from(self.max_difficulty))
    }
}

/// NaN becomes 0, everything else is clamped into [0, 1].
fn normalize_similarity(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Mastery, ProgressEvent};
    use crate::retrieval::{ContentChunk, InMemoryContentStore};
    use crate::types::Modality;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn objective() -> LearningObjective {
        LearningObjective::new("alg-1", "mathematics", "Linear equations", 3, 30)
    }

    fn candidate(id: &str, difficulty: u8, similarity: f64, modality: Modality) -> Candidate {
        Candidate {
            chunk: ContentChunk::new(id, "mathematics", difficulty)
                .with_modality(modality)
                .supporting("alg-1"),
            similarity,
        }
    }

    fn scorer_with(store: InMemoryContentStore, config: &EngineConfig) -> RetrievalScorer {
        RetrievalScorer::new(Arc::new(store), config)
    }

    #[test]
    fn test_score_formula_uniform_style() {
        let scorer = scorer_with(InMemoryContentStore::new(), &EngineConfig::default());
        let profile = StudentProfile::new("s1", 4);

        // similarity 0.8, difficulty 4 vs 3 -> 1 - 1/4 = 0.75, one tag -> 0.25
        let score = scorer.score(&candidate("c1", 4, 0.8, Modality::Visual), &objective(), &profile);
        let expected = 0.5 * 0.8 + 0.3 * 0.75 + 0.2 * 0.25;
        assert!((score - expected).abs() < 1e-12);
    }

    #[test]
    fn test_score_uses_learning_style() {
        let scorer = scorer_with(InMemoryContentStore::new(), &EngineConfig::default());
        let model = ProfileModel::new(&EngineConfig::default());
        let mut profile = StudentProfile::new("s1", 4);
        for _ in 0..5 {
            model
                .ingest(&mut profile, &ProgressEvent::new("x", 0.5).with_modality(Modality::Kinesthetic))
                .unwrap();
        }

        let hands_on = scorer.score(&candidate("c1", 3, 0.5, Modality::Kinesthetic), &objective(), &profile);
        let listening = scorer.score(&candidate("c2", 3, 0.5, Modality::Auditory), &objective(), &profile);
        assert!(hands_on > listening);
        assert!((hands_on - (0.5 * 0.5 + 0.3 * 1.0 + 0.2 * 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_score_stays_in_unit_range() {
        let scorer = scorer_with(InMemoryContentStore::new(), &EngineConfig::default());
        let profile = StudentProfile::new("s1", 4);
        for similarity in [-3.0, 0.0, 0.5, 1.0, 7.0, f64::NAN] {
            let score = scorer.score(&candidate("c", 5, similarity, Modality::Reading), &objective(), &profile);
            assert!((0.0..=1.0).contains(&score), "score {score} for similarity {similarity}");
        }
    }

    #[test]
    fn test_adaptive_difficulty_shifts_target() {
        let config = EngineConfig { adaptive_difficulty: true, ..EngineConfig::default() };
        let scorer = scorer_with(InMemoryContentStore::new(), &config);
        let objective = objective().requires("pre");
        let struggling = StudentProfile::new("s1", 4).with_mastery("pre", Mastery::new(0.1).unwrap());
        let strong = StudentProfile::new("s2", 4).with_mastery("pre", Mastery::new(0.95).unwrap());

        let easy = candidate("easy", 2, 0.5, Modality::Visual);
        let hard = candidate("hard", 4, 0.5, Modality::Visual);
        assert!(scorer.score(&easy, &objective, &struggling) > scorer.score(&hard, &objective, &struggling));
        assert!(scorer.score(&hard, &objective, &strong) > scorer.score(&easy, &objective, &strong));
    }

    #[tokio::test]
    async fn test_rank_orders_and_truncates() {
        let store = InMemoryContentStore::new()
            .with_chunk(ContentChunk::new("c-b", "mathematics", 3).supporting("alg-1"), Some(0.9))
            .with_chunk(ContentChunk::new("c-a", "mathematics", 3).supporting("alg-1"), Some(0.9))
            .with_chunk(ContentChunk::new("c-c", "mathematics", 3).supporting("alg-1"), Some(0.2))
            .with_chunk(ContentChunk::new("c-d", "mathematics", 1).supporting("alg-1"), Some(0.95));
        let scorer = scorer_with(store, &EngineConfig::default());
        let profile = StudentProfile::new("s1", 4);

        let ranked = scorer.rank(&objective(), &profile, 2).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|r| r.content_id.as_str()).collect();
        // c-a and c-b tie; lower id wins the tie
        assert_eq!(ids, vec!["c-a", "c-b"]);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[tokio::test]
    async fn test_rank_no_candidates() {
        let scorer = scorer_with(InMemoryContentStore::new(), &EngineConfig::default());
        let profile = StudentProfile::new("s1", 4);
        let result = scorer.rank(&objective(), &profile, 3).await;
        assert!(matches!(
            result,
            Err(PathwayError::NoCandidates { reason: SkipReason::NoMatches, .. })
        ));
    }

    #[tokio::test]
    async fn test_rank_with_huge_top_k() {
        let store = InMemoryContentStore::new()
            .with_chunk(ContentChunk::new("c-a", "mathematics", 3).supporting("alg-1"), Some(0.9))
            .with_chunk(ContentChunk::new("c-b", "mathematics", 3).supporting("alg-1"), Some(0.5));
        let scorer = scorer_with(store, &EngineConfig::default());
        let profile = StudentProfile::new("s1", 4);

        let ranked = scorer.rank(&objective(), &profile, usize::MAX).await.unwrap();
        assert_eq!(ranked.len(), 2);
    }

    struct FlakyStore {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ContentStore for FlakyStore {
        async fn query(&self, _query: &ContentQuery) -> std::result::Result<Vec<Candidate>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Io("connection refused".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rank_degrades_after_retries() {
        let store = Arc::new(FlakyStore { calls: AtomicU32::new(0) });
        let scorer = RetrievalScorer::new(store.clone(), &EngineConfig::default());
        let profile = StudentProfile::new("s1", 4);

        let result = scorer.rank(&objective(), &profile, 3).await;
        assert!(matches!(
            result,
            Err(PathwayError::NoCandidates { reason: SkipReason::StoreFailure { .. }, .. })
        ));
        // first call + retry_limit (2)
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    struct SlowStore;

    #[async_trait]
    impl ContentStore for SlowStore {
        async fn query(&self, _query: &ContentQuery) -> std::result::Result<Vec<Candidate>, StoreError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rank_times_out() {
        let scorer = RetrievalScorer::new(Arc::new(SlowStore), &EngineConfig::default());
        let profile = StudentProfile::new("s1", 4);

        let result = scorer.rank(&objective(), &profile, 3).await;
        assert!(matches!(
            result,
            Err(PathwayError::NoCandidates { reason: SkipReason::TimedOut { attempts: 3 }, .. })
        ));
    }
}
