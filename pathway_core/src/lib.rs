//! Pathway Core
//!
//! Learning path generation and retrieval engine:
//! - Competency graph: prerequisite DAG with deterministic ordering
//! - Student profile: EWMA mastery and learning-style weights
//! - Retrieval scorer: similarity fused with difficulty and modality fit
//! - Gap analyzer: unmastered prerequisites of the requested targets
//! - Path planner: ordered, paced, re-plannable learning paths

pub mod cancellation;
pub mod config;
pub mod error;
pub mod gaps;
pub mod graph;
pub mod path;
pub mod profile;
pub mod retrieval;
pub mod store;
pub mod types;

// Re-export main types
pub use cancellation::{CancellationToken, CancellationTokenSource};

pub use config::{EngineConfig, ScoreWeights};

pub use error::{PathwayError, Result, StoreError};

pub use gaps::{Gap, GapAnalyzer, GapReport};

pub use graph::{CompetencyGraph, LearningObjective, ObjectiveBounds};

pub use path::{
    LearningPath, PathPlanner, PathReport, PathState, PathStep, SkipReason, StepStatus,
};

pub use profile::{Mastery, MasteryError, ProfileModel, ProgressEvent, StudentProfile};

pub use retrieval::{
    Candidate, ContentChunk, ContentQuery, ContentStore, InMemoryContentStore, RankedCandidate,
    RetrievalScorer, RetryConfig, ScoreBreakdown,
};

pub use store::{InMemoryStudentStore, StudentStore};

pub use types::{ContentId, Modality, ModalityWeights, ObjectiveId, PathId, StudentId};

/// Version of the path generation core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the path generation core
pub fn init() {
    tracing::info!("Pathway Core v{}", VERSION);
}
