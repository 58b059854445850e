//! Storage abstraction for summaries.
//!
//! The [`SummaryStore`] trait is the semantic index the pipelines write to
//! and query: upsert by identity, nearest-neighbour lookup by text, and an
//! explicit flush at the end of a run.
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteSummaryStore`] | Persistent store used by the CLI |
//! | [`InMemorySummaryStore`] | Tests and dry experiments |
//!
//! Both own an [`Embedder`](crate::embedding::Embedder): callers pass text,
//! the store decides how it is vectorized.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{SimilarSummary, SummaryRecord};

pub use memory::InMemorySummaryStore;
pub use sqlite::SqliteSummaryStore;

#[async_trait]
pub trait SummaryStore: Send + Sync {
    /// Insert or overwrite the record stored under `record.identity`.
    async fn upsert(&self, record: &SummaryRecord) -> Result<()>;

    /// Up to `k` stored summaries ranked by similarity to `query_text`.
    async fn query_nearest(&self, query_text: &str, k: usize) -> Result<Vec<SimilarSummary>>;

    /// Number of stored records.
    async fn count(&self) -> Result<i64>;

    /// Persist everything written so far.
    async fn flush(&self) -> Result<()>;
}

/// Sort by descending score, breaking ties by title for stable output.
pub(crate) fn rank(mut results: Vec<SimilarSummary>, k: usize) -> Vec<SimilarSummary> {
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.metadata.title.cmp(&b.metadata.title))
    });
    results.truncate(k);
    results
}
