//! In-memory [`SummaryStore`] for tests.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Vector search is brute-force
//! cosine similarity over all stored vectors. Counts queries so callers can
//! assert that retrieval did or did not happen.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::{cosine_similarity, embed_one, embed_optional, Embedder};
use crate::models::{SimilarSummary, SummaryRecord};

use super::{rank, SummaryStore};

struct StoredSummary {
    record: SummaryRecord,
    vector: Option<Vec<f32>>,
}

pub struct InMemorySummaryStore {
    embedder: Box<dyn Embedder>,
    records: RwLock<HashMap<String, StoredSummary>>,
    queries: AtomicUsize,
    flushes: AtomicUsize,
}

impl InMemorySummaryStore {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            records: RwLock::new(HashMap::new()),
            queries: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
        }
    }

    /// Snapshot of stored records, sorted by identity.
    pub fn records(&self) -> Vec<SummaryRecord> {
        let guard = match self.records.read() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut out: Vec<SummaryRecord> = guard.values().map(|s| s.record.clone()).collect();
        out.sort_by(|a, b| a.identity.cmp(&b.identity));
        out
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryStore for InMemorySummaryStore {
    async fn upsert(&self, record: &SummaryRecord) -> Result<()> {
        let vector = embed_optional(self.embedder.as_ref(), &record.summary_text).await?;
        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("summary store lock poisoned"))?;
        records.insert(
            record.identity.clone(),
            StoredSummary {
                record: record.clone(),
                vector,
            },
        );
        Ok(())
    }

    async fn query_nearest(&self, query_text: &str, k: usize) -> Result<Vec<SimilarSummary>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if !self.embedder.is_enabled() {
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.embedder.as_ref(), query_text).await?;
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("summary store lock poisoned"))?;
        let results = records
            .values()
            .filter_map(|s| {
                let vector = s.vector.as_ref()?;
                Some(SimilarSummary {
                    metadata: s.record.metadata.clone(),
                    document: s.record.summary_text.clone(),
                    score: cosine_similarity(&query_vec, vector),
                })
            })
            .collect();
        Ok(rank(results, k))
    }

    async fn count(&self) -> Result<i64> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("summary store lock poisoned"))?;
        Ok(records.len() as i64)
    }

    async fn flush(&self) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SummaryMetadata;
    use chrono::NaiveDate;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        fn model_name(&self) -> &str {
            "length"
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| vec![1.0, t.len() as f32]).collect())
        }
    }

    fn record(identity: &str, text: &str) -> SummaryRecord {
        SummaryRecord {
            identity: identity.to_string(),
            summary_text: text.to_string(),
            metadata: SummaryMetadata {
                title: identity.to_string(),
                date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
                source_file: format!("{}.pdf", identity),
            },
        }
    }

    #[tokio::test]
    async fn overwrites_by_identity_and_counts_queries() {
        let store = InMemorySummaryStore::new(Box::new(LengthEmbedder));
        store.upsert(&record("a", "one")).await.unwrap();
        store.upsert(&record("a", "one again")).await.unwrap();
        store.upsert(&record("b", "two")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.records()[0].summary_text, "one again");

        assert_eq!(store.query_count(), 0);
        let hits = store.query_nearest("x", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(store.query_count(), 1);
    }
}
