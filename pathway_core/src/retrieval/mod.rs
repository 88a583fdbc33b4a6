//! Content retrieval and scoring
//!
//! The content store is an external collaborator: given subject and tag
//! filters plus query text it returns candidate chunks with a raw similarity
//! score. [`RetrievalScorer`] fuses that similarity with pedagogical fit and
//! guards every store call with a timeout and bounded retries.

mod memory;
mod retry;
mod scorer;

pub use memory::InMemoryContentStore;
pub use retry::{execute_with_retry, RetryConfig, RetryOutcome};
pub use scorer::{RankedCandidate, RetrievalScorer, ScoreBreakdown};

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{ContentId, Modality, ObjectiveId};

/// Pre-chunked content with stable id and metadata.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
    pub id: ContentId,
    pub subject: String,
    pub difficulty: u8,
    #[serde(default)]
    pub modality_tags: BTreeSet<Modality>,
    /// Objectives this chunk best supports
    #[serde(default)]
    pub prerequisite_tags: BTreeSet<ObjectiveId>,
    /// Chunk text, used by stores without embeddings
    #[serde(default)]
    pub text: String,
}

impl ContentChunk {
    pub fn new(id: impl Into<ContentId>, subject: impl Into<String>, difficulty: u8) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            difficulty,
            modality_tags: BTreeSet::new(),
            prerequisite_tags: BTreeSet::new(),
            text: String::new(),
        }
    }

    pub fn with_modality(mut self, modality: Modality) -> Self {
        self.modality_tags.insert(modality);
        self
    }

    pub fn supporting(mut self, objective: impl Into<ObjectiveId>) -> Self {
        self.prerequisite_tags.insert(objective.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
}

/// One store result: a chunk plus its raw similarity for this query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub chunk: ContentChunk,
    pub similarity: f64,
}

/// Query sent to the content store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentQuery {
    pub subject: String,
    /// Chunks must support at least one of these objectives; empty matches all
    pub tags: Vec<ObjectiveId>,
    pub text: String,
    pub limit: usize,
}

/// External content store.
///
/// Implementations must be idempotent for identical queries at a fixed
/// index state; results are ordered by similarity, best first.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn query(&self, query: &ContentQuery) -> Result<Vec<Candidate>, StoreError>;
}
