//! SQLite-backed [`SummaryStore`].
//!
//! Vectors are stored as little-endian f32 BLOBs next to the summary text;
//! nearest-neighbour lookup is a brute-force cosine scan, which is ample for
//! a corpus that grows by a handful of papers per day.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::config::Config;
use crate::db;
use crate::embedding::{
    blob_to_vec, cosine_similarity, embed_one, embed_optional, vec_to_blob, Embedder,
};
use crate::migrate;
use crate::models::{SimilarSummary, SummaryMetadata, SummaryRecord};

use super::{rank, SummaryStore};

pub struct SqliteSummaryStore {
    pool: SqlitePool,
    embedder: Box<dyn Embedder>,
}

impl SqliteSummaryStore {
    /// Open (creating if needed) the database named in `config.db.path`.
    pub async fn open(config: &Config, embedder: Box<dyn Embedder>) -> Result<Self> {
        let pool = db::connect(config)
            .await
            .with_context(|| format!("Failed to open database: {}", config.db.path.display()))?;
        Self::from_pool(pool, embedder).await
    }

    pub async fn from_pool(pool: SqlitePool, embedder: Box<dyn Embedder>) -> Result<Self> {
        migrate::ensure_schema(&pool).await?;
        Ok(Self { pool, embedder })
    }

    /// Close the underlying pool. Call [`SummaryStore::flush`] first.
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SummaryStore for SqliteSummaryStore {
    async fn upsert(&self, record: &SummaryRecord) -> Result<()> {
        let vector = embed_optional(self.embedder.as_ref(), &record.summary_text).await?;
        let model = vector.as_ref().map(|_| self.embedder.model_name());
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO summaries (id, document, title, date, source_file, embedding, model, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                title = excluded.title,
                date = excluded.date,
                source_file = excluded.source_file,
                embedding = excluded.embedding,
                model = excluded.model,
                created_at = excluded.created_at
            "#,
        )
        .bind(&record.identity)
        .bind(&record.summary_text)
        .bind(&record.metadata.title)
        .bind(record.metadata.date.format("%Y-%m-%d").to_string())
        .bind(&record.metadata.source_file)
        .bind(vector.as_deref().map(vec_to_blob))
        .bind(model)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(id = %record.identity, "summary upserted");
        Ok(())
    }

    async fn query_nearest(&self, query_text: &str, k: usize) -> Result<Vec<SimilarSummary>> {
        if !self.embedder.is_enabled() {
            debug!("embeddings disabled; no similar summaries");
            return Ok(Vec::new());
        }
        let query_vec = embed_one(self.embedder.as_ref(), query_text).await?;

        let rows = sqlx::query(
            "SELECT document, title, date, source_file, embedding FROM summaries WHERE embedding IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let blob: Vec<u8> = row.get("embedding");
            let date: String = row.get("date");
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("Malformed date in summaries table: {}", date))?;
            results.push(SimilarSummary {
                metadata: SummaryMetadata {
                    title: row.get("title"),
                    date,
                    source_file: row.get("source_file"),
                },
                document: row.get("document"),
                score: cosine_similarity(&query_vec, &blob_to_vec(&blob)),
            });
        }

        Ok(rank(results, k))
    }

    async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn flush(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledEmbedder;

    /// Two-dimensional vectors: (mentions of "graph", mentions of "protein").
    struct TopicEmbedder;

    #[async_trait]
    impl Embedder for TopicEmbedder {
        fn model_name(&self) -> &str {
            "topic"
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let t = t.to_lowercase();
                    vec![
                        t.matches("graph").count() as f32,
                        t.matches("protein").count() as f32,
                    ]
                })
                .collect())
        }
    }

    fn record(title: &str, day: u32, text: &str) -> SummaryRecord {
        let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
        SummaryRecord {
            identity: format!("{}_{}", title, date),
            summary_text: text.to_string(),
            metadata: SummaryMetadata {
                title: title.to_string(),
                date,
                source_file: format!("{}.pdf", title),
            },
        }
    }

    async fn open_temp() -> (tempfile::TempDir, SqliteSummaryStore) {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("s.sqlite")).await.unwrap();
        let store = SqliteSummaryStore::from_pool(pool, Box::new(TopicEmbedder))
            .await
            .unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn upsert_same_identity_overwrites() {
        let (_tmp, store) = open_temp().await;
        store.upsert(&record("gnn", 15, "graph nets")).await.unwrap();
        store.upsert(&record("gnn", 15, "graph graph nets")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        store.upsert(&record("gnn", 16, "graph nets")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn nearest_ranks_by_similarity_and_limits() {
        let (_tmp, store) = open_temp().await;
        store.upsert(&record("gnn", 15, "graph learning")).await.unwrap();
        store.upsert(&record("fold", 15, "protein folding")).await.unwrap();
        store.upsert(&record("mix", 15, "graph protein")).await.unwrap();

        let hits = store.query_nearest("protein structure", 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].metadata.title, "fold");
        assert_eq!(hits[0].document, "protein folding");
        assert_eq!(hits[1].metadata.title, "mix");
    }

    #[tokio::test]
    async fn disabled_embedder_stores_without_vector() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("s.sqlite")).await.unwrap();
        let store = SqliteSummaryStore::from_pool(pool.clone(), Box::new(DisabledEmbedder))
            .await
            .unwrap();
        store.upsert(&record("gnn", 15, "graph nets")).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let embedded: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM summaries WHERE embedding IS NOT NULL")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(embedded, 0);
        assert!(store.query_nearest("graph", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn flush_and_reopen_keeps_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("s.sqlite");
        {
            let pool = db::connect_path(&path).await.unwrap();
            let store = SqliteSummaryStore::from_pool(pool, Box::new(TopicEmbedder))
                .await
                .unwrap();
            store.upsert(&record("gnn", 15, "graph")).await.unwrap();
            store.flush().await.unwrap();
            store.close().await;
        }
        let pool = db::connect_path(&path).await.unwrap();
        let store = SqliteSummaryStore::from_pool(pool, Box::new(TopicEmbedder))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
