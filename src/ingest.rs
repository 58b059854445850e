//! Ingestion pipeline orchestration.
//!
//! Coordinates one ingestion pass: readiness check → scan → "new" window →
//! abstract extraction → fast summary → store by identity. Documents are
//! processed strictly in order; a failure on one document is logged and
//! counted, and the batch moves on.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::extract::{extract_abstract, PageExtractor};
use crate::identity::identity_for;
use crate::models::{Document, SummaryMetadata, SummaryRecord};
use crate::scan::scan_documents;
use crate::store::SummaryStore;
use crate::summarize::{ensure_ready, FastSummarizer};
use crate::window::Windows;

/// Instruction sent to the fast backend ahead of each abstract.
pub const SUMMARIZE_ABSTRACT_PROMPT: &str = "Summarize the following abstract in one sentence:";

pub fn abstract_prompt(abstract_text: &str) -> String {
    format!("{}\n\n{}", SUMMARIZE_ABSTRACT_PROMPT, abstract_text)
}

/// Counters for one ingestion pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub scanned: usize,
    pub new: usize,
    pub no_abstract: usize,
    pub stored: usize,
    pub failed: usize,
}

enum Outcome {
    Stored,
    NoAbstract,
    DryRun,
}

pub struct IngestionPipeline<'a> {
    config: &'a Config,
    extractor: &'a dyn PageExtractor,
    summarizer: &'a dyn FastSummarizer,
    store: &'a dyn SummaryStore,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(
        config: &'a Config,
        extractor: &'a dyn PageExtractor,
        summarizer: &'a dyn FastSummarizer,
        store: &'a dyn SummaryStore,
    ) -> Self {
        Self {
            config,
            extractor,
            summarizer,
            store,
        }
    }

    /// Run one pass against the papers directory as of `now`.
    ///
    /// Fails only when the fast backend cannot be made ready or the
    /// directory cannot be listed. With `dry_run`, the backend is not
    /// contacted and nothing is written; `stored` counts what would be.
    pub async fn run(&self, now: DateTime<Utc>, dry_run: bool) -> Result<IngestStats> {
        if !dry_run {
            ensure_ready(
                self.summarizer,
                Duration::from_secs(self.config.fast.ready_timeout_secs),
            )
            .await
            .context("Fast summarizer is unavailable")?;
        }

        let windows = Windows::from(&self.config.windows);
        let docs = scan_documents(&self.config.papers.dir, &self.config.papers.extension)?;
        let today = now.date_naive();

        let mut stats = IngestStats {
            scanned: docs.len(),
            ..Default::default()
        };

        for doc in &docs {
            if !windows.is_new(doc.modified, now) {
                debug!(file = %doc.file_name(), modified = %doc.modified, "outside new window");
                continue;
            }
            stats.new += 1;

            match self.process(doc, today, dry_run).await {
                Ok(Outcome::Stored) | Ok(Outcome::DryRun) => stats.stored += 1,
                Ok(Outcome::NoAbstract) => {
                    info!(file = %doc.file_name(), "no abstract found; skipping");
                    stats.no_abstract += 1;
                }
                Err(e) => {
                    warn!(file = %doc.file_name(), error = %format!("{:#}", e), "ingestion failed; skipping");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn process(&self, doc: &Document, today: NaiveDate, dry_run: bool) -> Result<Outcome> {
        let abstract_text = match extract_abstract(self.extractor, &doc.path)? {
            Some(text) => text,
            None => return Ok(Outcome::NoAbstract),
        };

        let title = doc.title();
        let identity = identity_for(&title, today)?;

        if dry_run {
            return Ok(Outcome::DryRun);
        }

        let summary = self
            .summarizer
            .generate(&self.config.fast.model, &abstract_prompt(&abstract_text))
            .await
            .context("summarization failed")?;
        if summary.trim().is_empty() {
            anyhow::bail!("summarizer returned an empty summary");
        }

        let record = SummaryRecord {
            identity,
            summary_text: summary,
            metadata: SummaryMetadata {
                title,
                date: today,
                source_file: doc.file_name(),
            },
        };
        self.store
            .upsert(&record)
            .await
            .context("failed to store summary")?;

        info!(id = %record.identity, "summary stored");
        Ok(Outcome::Stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_instruction_then_abstract() {
        let p = abstract_prompt("Abstract\nWe study X.");
        assert!(p.starts_with(SUMMARIZE_ABSTRACT_PROMPT));
        assert!(p.ends_with("Abstract\nWe study X."));
    }
}
