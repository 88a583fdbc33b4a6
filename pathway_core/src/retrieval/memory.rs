//! In-memory content store.
//!
//! Holds pre-chunked content in a map and answers queries with a subject
//! and tag filter. Similarity is either a fixed value stored with the chunk
//! or the share of query terms found in the chunk text.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Candidate, ContentChunk, ContentQuery, ContentStore};
use crate::error::StoreError;
use crate::types::{ContentId, ObjectiveId};

#[derive(Clone, Debug)]
struct StoredChunk {
    chunk: ContentChunk,
    similarity: Option<f64>,
}

/// Reference [`ContentStore`] backed by a `BTreeMap`.
///
/// Failures and latency can be injected so callers can exercise their
/// timeout and retry handling.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    chunks: BTreeMap<ContentId, StoredChunk>,
    latency: HashMap<ObjectiveId, Duration>,
    pending_failures: Mutex<VecDeque<StoreError>>,
    queries: AtomicU64,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chunk (builder pattern).
    ///
    /// `similarity` fixes the score returned for every query; `None` uses
    /// keyword overlap with the query text.
    pub fn with_chunk(mut self, chunk: ContentChunk, similarity: Option<f64>) -> Self {
        self.insert(chunk, similarity);
        self
    }

    /// Delays every query tagged with `objective` (builder pattern).
    pub fn with_latency_for(mut self, objective: impl Into<ObjectiveId>, delay: Duration) -> Self {
        self.latency.insert(objective.into(), delay);
        self
    }

    /// Adds or replaces a chunk.
    pub fn insert(&mut self, chunk: ContentChunk, similarity: Option<f64>) {
        self.chunks
            .insert(chunk.id.clone(), StoredChunk { chunk, similarity });
    }

    /// Makes the next queries fail with the given errors, one per query.
    pub async fn fail_next(&self, errors: impl IntoIterator<Item = StoreError>) {
        self.pending_failures.lock().await.extend(errors);
    }

    /// Number of queries received so far, including failed ones.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn matches(query: &ContentQuery, chunk: &ContentChunk) -> bool {
        if !query.subject.is_empty() && chunk.subject != query.subject {
            return false;
        }
        query.tags.is_empty() || query.tags.iter().any(|tag| chunk.prerequisite_tags.contains(tag))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn query(&self, query: &ContentQuery) -> Result<Vec<Candidate>, StoreError> {
        self.queries.fetch_add(1, Ordering::Relaxed);

        if query.limit == 0 {
            return Err(StoreError::InvalidQuery("limit must be positive".to_string()));
        }

        let delay = query
            .tags
            .iter()
            .filter_map(|tag| self.latency.get(tag))
            .max()
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.pending_failures.lock().await.pop_front() {
            return Err(err);
        }

        let terms = tokenize(&query.text);
        let mut results: Vec<Candidate> = self
            .chunks
            .values()
            .filter(|stored| Self::matches(query, &stored.chunk))
            .map(|stored| Candidate {
                chunk: stored.chunk.clone(),
                similarity: stored
                    .similarity
                    .unwrap_or_else(|| keyword_overlap(&terms, &stored.chunk.text)),
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        results.truncate(query.limit);
        Ok(results)
    }
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Share of query terms present in the chunk text.
fn keyword_overlap(query_terms: &BTreeSet<String>, text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let doc_terms = tokenize(text);
    let shared = query_terms.intersection(&doc_terms).count();
    shared as f64 / query_terms.len() as f64
}
