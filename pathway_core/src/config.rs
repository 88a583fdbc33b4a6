//! Engine configuration.
//!
//! All tunables live in one immutable [`EngineConfig`] passed to each
//! component at construction. Every field has a documented default, so a
//! YAML file only needs to name the values it overrides:
//!
//! ```yaml
//! mastery_threshold: 0.7
//! score_weights:
//!   similarity: 0.6
//!   difficulty: 0.2
//!   modality: 0.2
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PathwayError, Result};

/// Weights of the composite retrieval score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight for semantic similarity (default: 0.5)
    pub similarity: f64,
    /// Weight for difficulty fit (default: 0.3)
    pub difficulty: f64,
    /// Weight for modality fit (default: 0.2)
    pub modality: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            similarity: 0.5,
            difficulty: 0.3,
            modality: 0.2,
        }
    }
}

impl ScoreWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.similarity + self.difficulty + self.modality
    }
}

/// Configuration for the path generation engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Mastery below this value marks a prerequisite as a gap (default: 0.6)
    pub mastery_threshold: f64,
    /// EWMA smoothing factor for mastery updates (default: 0.3)
    pub ewma_alpha: f64,
    /// Number of recent modality observations kept (default: 20)
    pub style_window: usize,
    /// Observations needed before style weights leave uniform (default: 3)
    pub style_min_observations: usize,
    /// Composite score weights
    pub score_weights: ScoreWeights,
    /// Content chunks chosen per objective (default: 3)
    pub top_k_candidates: usize,
    /// Retries after the first failed content-store call (default: 2)
    pub retry_limit: u32,
    /// Backoff before the first retry, in milliseconds (default: 100)
    pub retry_base_delay_ms: u64,
    /// Backoff cap, in milliseconds (default: 2000)
    pub retry_max_delay_ms: u64,
    /// Per-call content-store timeout in seconds (default: 5)
    pub io_timeout_seconds: u64,
    /// Objectives per session when a profile sets no pacing (default: 4)
    pub pacing_default: usize,
    /// Lowest difficulty on the ordinal scale (default: 1)
    pub min_difficulty: u8,
    /// Highest difficulty on the ordinal scale (default: 5)
    pub max_difficulty: u8,
    /// Shortest allowed objective duration in minutes (default: 15)
    pub min_objective_minutes: u32,
    /// Longest allowed objective duration in minutes (default: 60)
    pub max_objective_minutes: u32,
    /// Shift the desired difficulty by the student's mastery (default: false)
    pub adaptive_difficulty: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mastery_threshold: 0.6,
            ewma_alpha: 0.3,
            style_window: 20,
            style_min_observations: 3,
            score_weights: ScoreWeights::default(),
            top_k_candidates: 3,
            retry_limit: 2,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 2_000,
            io_timeout_seconds: 5,
            pacing_default: 4,
            min_difficulty: 1,
            max_difficulty: 5,
            min_objective_minutes: 15,
            max_objective_minutes: 60,
            adaptive_difficulty: false,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: EngineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Checks every field against its allowed range.
    pub fn validate(&self) -> Result<()> {
        fn unit(name: &str, value: f64) -> Result<()> {
            if !(0.0..=1.0).contains(&value) {
                return Err(PathwayError::Config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
            Ok(())
        }

        unit("mastery_threshold", self.mastery_threshold)?;
        unit("ewma_alpha", self.ewma_alpha)?;
        if self.ewma_alpha == 0.0 {
            return Err(PathwayError::Config(
                "ewma_alpha of 0 would freeze mastery".to_string(),
            ));
        }

        let w = &self.score_weights;
        for (name, value) in [
            ("similarity", w.similarity),
            ("difficulty", w.difficulty),
            ("modality", w.modality),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PathwayError::Config(format!(
                    "score weight {name} must be a non-negative number, got {value}"
                )));
            }
        }
        if w.total() <= 0.0 {
            return Err(PathwayError::Config(
                "score weights must not all be zero".to_string(),
            ));
        }

        if self.style_window == 0 {
            return Err(PathwayError::Config("style_window must be positive".to_string()));
        }
        if self.top_k_candidates == 0 {
            return Err(PathwayError::Config(
                "top_k_candidates must be positive".to_string(),
            ));
        }
        if self.pacing_default == 0 {
            return Err(PathwayError::Config("pacing_default must be positive".to_string()));
        }
        if self.io_timeout_seconds == 0 {
            return Err(PathwayError::Config(
                "io_timeout_seconds must be positive".to_string(),
            ));
        }
        if self.min_difficulty >= self.max_difficulty {
            return Err(PathwayError::Config(format!(
                "difficulty range {}..={} is empty",
                self.min_difficulty, self.max_difficulty
            )));
        }
        if self.min_objective_minutes > self.max_objective_minutes {
            return Err(PathwayError::Config(format!(
                "objective duration range {}..={} is empty",
                self.min_objective_minutes, self.max_objective_minutes
            )));
        }
        Ok(())
    }

    /// Per-call content-store timeout.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_seconds)
    }

    /// Width of the difficulty scale, used to normalize difficulty fit.
    pub fn difficulty_span(&self) -> f64 {
        f64::from(self.max_difficulty.saturating_sub(self.min_difficulty).max(1))
    }
}
