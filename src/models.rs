//! Core data models used throughout the digest pipeline.
//!
//! These types represent the source documents, stored summaries, and the
//! composed weekly digest that flow between ingestion, storage, and
//! rendering.

use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;

/// A source file found in the papers directory. Read-only to this system.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

impl Document {
    /// Title derived from the file name without its extension.
    pub fn title(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Metadata stored alongside every summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryMetadata {
    pub title: String,
    pub date: NaiveDate,
    pub source_file: String,
}

/// A stored summary keyed by its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRecord {
    pub identity: String,
    pub summary_text: String,
    pub metadata: SummaryMetadata,
}

/// A stored summary returned from nearest-neighbour retrieval.
#[derive(Debug, Clone)]
pub struct SimilarSummary {
    pub metadata: SummaryMetadata,
    pub document: String,
    pub score: f32,
}

/// One theme parsed out of the weekly summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub title: String,
    pub summary: String,
}

/// The weekly summary, structured when the backend followed the requested
/// format, opaque otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklySummary {
    pub raw: String,
    pub themes: Vec<Theme>,
    pub conclusion: Option<String>,
}

/// Everything the renderer needs for one weekly report.
#[derive(Debug, Clone)]
pub struct Digest {
    pub week_start: NaiveDate,
    pub week_ending: NaiveDate,
    pub combined_text: String,
    pub weekly_summary: WeeklySummary,
    pub similar_research: String,
    pub research_directions: String,
    pub aside: String,
}
