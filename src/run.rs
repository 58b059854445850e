//! Per-run orchestration.
//!
//! A run takes the run lock, opens the store once, executes the requested
//! stages in order, and flushes the store before returning. The flush is
//! attempted even when a stage fails, so summaries stored before the failure
//! are not lost.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::config::Config;
use crate::digest::{DigestOutcome, DigestPipeline};
use crate::embedding::{create_embedder, DisabledEmbedder, Embedder};
use crate::extract::{PageExtractor, PdfPageExtractor};
use crate::ingest::{IngestStats, IngestionPipeline};
use crate::lock::RunLock;
use crate::render::{DigestRenderer, MarkdownRenderer};
use crate::store::{SqliteSummaryStore, SummaryStore};
use crate::summarize::{
    BackendError, Completer, FastSummarizer, OllamaSummarizer, OpenAICompleter,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Digest,
    All,
}

impl Stage {
    fn ingests(self) -> bool {
        matches!(self, Stage::Ingest | Stage::All)
    }

    fn digests(self) -> bool {
        matches!(self, Stage::Digest | Stage::All)
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub ingest: Option<IngestStats>,
    pub digest: Option<DigestOutcome>,
}

/// Explicitly owned collaborators for one run.
///
/// Backends a stage does not need may be `None`; requesting that stage
/// without its backend is an error.
pub struct Collaborators<'a> {
    pub extractor: &'a dyn PageExtractor,
    pub fast: Option<&'a dyn FastSummarizer>,
    pub completer: Option<&'a dyn Completer>,
    pub store: &'a dyn SummaryStore,
    pub renderer: &'a dyn DigestRenderer,
}

/// Execute `stage` and flush the store, whatever the outcome.
pub async fn run_stages(
    config: &Config,
    stage: Stage,
    dry_run: bool,
    now: DateTime<Utc>,
    c: &Collaborators<'_>,
) -> Result<RunReport> {
    let result = execute(config, stage, dry_run, now, c).await;
    let flushed = c.store.flush().await;

    match (result, flushed) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e.context("Failed to flush summary store")),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(flush_err)) => {
            error!(error = %format!("{:#}", flush_err), "flush after failed run also failed");
            Err(e)
        }
    }
}

async fn execute(
    config: &Config,
    stage: Stage,
    dry_run: bool,
    now: DateTime<Utc>,
    c: &Collaborators<'_>,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    if stage.ingests() {
        let fast = c
            .fast
            .ok_or_else(|| anyhow!("ingestion requires a fast summarizer"))?;
        let stats = IngestionPipeline::new(config, c.extractor, fast, c.store)
            .run(now, dry_run)
            .await?;
        info!(
            scanned = stats.scanned,
            new = stats.new,
            stored = stats.stored,
            failed = stats.failed,
            "ingestion finished"
        );
        report.ingest = Some(stats);
    }

    if stage.digests() {
        let completer = c
            .completer
            .ok_or_else(|| anyhow!("the digest requires a completion backend"))?;
        let outcome = DigestPipeline::new(config, c.extractor, completer, c.store, c.renderer)
            .run(now, dry_run)
            .await?;
        report.digest = Some(outcome);
    }

    Ok(report)
}

/// Open the configured backends and store, then run under the run lock.
pub async fn run(config: &Config, stage: Stage, dry_run: bool) -> Result<RunReport> {
    let lock = RunLock::acquire(&config.lock_path())?;
    let now = Utc::now();
    info!(lock = %lock.path().display(), ?stage, dry_run, "run started");

    // A dry run neither writes nor queries, so it needs no embedder.
    let embedder: Box<dyn Embedder> = if dry_run {
        Box::new(DisabledEmbedder)
    } else {
        create_embedder(&config.embedding, config.openai_api_key.as_deref())?
    };
    let store = SqliteSummaryStore::open(config, embedder).await?;

    let fast = if stage.ingests() {
        Some(OllamaSummarizer::new(&config.fast)?)
    } else {
        None
    };
    let completer = if stage.digests() && !dry_run {
        Some(OpenAICompleter::new(
            &config.rich,
            config.openai_api_key.as_deref(),
        )?)
    } else {
        None
    };
    let completer_ref: Option<&dyn Completer> = match &completer {
        Some(c) => Some(c as &dyn Completer),
        None if dry_run => Some(&NoCompletion),
        None => None,
    };

    let collaborators = Collaborators {
        extractor: &PdfPageExtractor,
        fast: fast.as_ref().map(|f| f as &dyn FastSummarizer),
        completer: completer_ref,
        store: &store,
        renderer: &MarkdownRenderer,
    };

    let result = run_stages(config, stage, dry_run, now, &collaborators).await;
    store.close().await;
    drop(lock);
    result
}

/// Stand-in for dry runs, which stop before any completion.
struct NoCompletion;

#[async_trait]
impl Completer for NoCompletion {
    async fn complete(
        &self,
        _model: &str,
        _role_prompt: &str,
        _user_prompt: &str,
    ) -> Result<String, BackendError> {
        Err(BackendError::Config(
            "completions are not available in a dry run".to_string(),
        ))
    }
}
