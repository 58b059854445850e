//! `rdigest similar`: inspect the nearest stored summaries for a piece of
//! text, the same lookup the digest performs with its weekly summary.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::store::{SqliteSummaryStore, SummaryStore};

pub async fn run_similar(config: &Config, text: &str, limit: Option<usize>) -> Result<()> {
    if text.trim().is_empty() {
        bail!("Query text must not be empty");
    }
    if !config.embedding.is_enabled() {
        bail!("Similarity lookup requires an embedding provider; set [embedding].provider");
    }

    let embedder = create_embedder(&config.embedding, config.openai_api_key.as_deref())?;
    let store = SqliteSummaryStore::open(config, embedder).await?;
    let k = limit.unwrap_or(config.retrieval.similar_k);
    let results = store.query_nearest(text, k).await;
    store.close().await;
    let results = results?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. [{:.2}] {}", i + 1, r.score, r.metadata.title);
        println!("    date: {}", r.metadata.date);
        println!("    file: {}", r.metadata.source_file);
        println!("    summary: \"{}\"", r.document.replace('\n', " ").trim());
        println!();
    }

    Ok(())
}
