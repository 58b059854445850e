//! Weekly digest pipeline.
//!
//! Collects abstracts of documents modified within the week window, asks the
//! rich backend for a themed summary, retrieves the nearest prior summaries
//! from the store, asks for research directions and a closing aside, and
//! renders the report.
//!
//! The digest is one coherent document: any failed or empty completion, or
//! a failed retrieval, aborts the run and nothing is written. Per-document
//! extraction failures are skipped like extraction misses.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::extract::{extract_abstract, PageExtractor};
use crate::models::{Digest, SimilarSummary, Theme, WeeklySummary};
use crate::render::{write_digest, DigestRenderer};
use crate::scan::scan_documents;
use crate::store::SummaryStore;
use crate::summarize::Completer;
use crate::window::{WeekRange, Windows};

pub const WEEKLY_ROLE: &str =
    "You are a helpful assistant that summarizes academic research and identifies key themes.";
pub const DIRECTIONS_ROLE: &str =
    "You are a helpful assistant that suggests research problems and directions.";
pub const ASIDE_ROLE: &str = "You are a helpful assistant that generates bad jokes.";
pub const ASIDE_PROMPT: &str = "Tell me a bad joke related to scientific research.";

const THEME_PREFIX: &str = "THEME:";
const CONCLUSION_PREFIX: &str = "CONCLUSION:";
const THEME_SEPARATOR: &str = "::";

pub fn weekly_prompt(combined: &str) -> String {
    format!(
        "Summarize the following abstracts and identify key themes.\n\
         Answer with one line per theme in the form `{} <short title> {} <summary>`, \
         followed by a single line `{} <overall takeaway>`.\n\n{}",
        THEME_PREFIX, THEME_SEPARATOR, CONCLUSION_PREFIX, combined
    )
}

pub fn directions_prompt(weekly_summary: &str, similar_research: &str) -> String {
    format!(
        "Based on this weekly summary and similar research, suggest potential research problems and directions:\n\n\
         Weekly Summary:\n{}\n\nSimilar Research:\n{}",
        weekly_summary, similar_research
    )
}

/// Result of one digest run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DigestOutcome {
    /// No in-week document had an abstract; nothing was queried or written.
    NoInput { scanned: usize },
    /// Dry run: abstracts that would have been summarized.
    DryRun { scanned: usize, abstracts: usize },
    Written {
        scanned: usize,
        abstracts: usize,
        similar: usize,
        path: PathBuf,
    },
}

pub struct DigestPipeline<'a> {
    config: &'a Config,
    extractor: &'a dyn PageExtractor,
    completer: &'a dyn Completer,
    store: &'a dyn SummaryStore,
    renderer: &'a dyn DigestRenderer,
}

impl<'a> DigestPipeline<'a> {
    pub fn new(
        config: &'a Config,
        extractor: &'a dyn PageExtractor,
        completer: &'a dyn Completer,
        store: &'a dyn SummaryStore,
        renderer: &'a dyn DigestRenderer,
    ) -> Self {
        Self {
            config,
            extractor,
            completer,
            store,
            renderer,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>, dry_run: bool) -> Result<DigestOutcome> {
        let windows = Windows::from(&self.config.windows);
        let week = windows.week_range(now);

        let docs = scan_documents(&self.config.papers.dir, &self.config.papers.extension)?;
        let scanned = docs.len();

        let mut abstracts = Vec::new();
        for doc in &docs {
            if !windows.in_week(doc.modified, now) {
                debug!(file = %doc.file_name(), modified = %doc.modified, "outside week window");
                continue;
            }
            match extract_abstract(self.extractor, &doc.path) {
                Ok(Some(text)) if !text.trim().is_empty() => abstracts.push(text),
                Ok(_) => debug!(file = %doc.file_name(), "no abstract found"),
                Err(e) => warn!(file = %doc.file_name(), error = %e, "extraction failed; skipping"),
            }
        }

        if abstracts.is_empty() {
            info!(week_ending = %week.end_date(), "no in-week abstracts; digest skipped");
            return Ok(DigestOutcome::NoInput { scanned });
        }

        if dry_run {
            return Ok(DigestOutcome::DryRun {
                scanned,
                abstracts: abstracts.len(),
            });
        }

        let (digest, similar) = self.compose(week, &abstracts).await?;
        let path = write_digest(self.renderer, &digest, &self.config.output.dir)?;
        info!(path = %path.display(), "digest written");

        Ok(DigestOutcome::Written {
            scanned,
            abstracts: abstracts.len(),
            similar,
            path,
        })
    }

    /// Run the completion and retrieval steps; returns the digest and the
    /// number of similar summaries retrieved.
    async fn compose(&self, week: WeekRange, abstracts: &[String]) -> Result<(Digest, usize)> {
        let model = &self.config.rich.model;
        let combined_text = abstracts.join("\n\n");

        let weekly_raw = self
            .complete(model, WEEKLY_ROLE, &weekly_prompt(&combined_text), "weekly summary")
            .await?;
        let weekly_summary = parse_weekly_summary(&weekly_raw);

        let similar = self
            .store
            .query_nearest(&weekly_raw, self.config.retrieval.similar_k)
            .await
            .context("similarity retrieval failed")?;
        let similar_research = format_similar(&similar);

        let research_directions = self
            .complete(
                model,
                DIRECTIONS_ROLE,
                &directions_prompt(&weekly_raw, &similar_research),
                "research directions",
            )
            .await?;

        let aside = self
            .complete(model, ASIDE_ROLE, ASIDE_PROMPT, "closing aside")
            .await?;

        let digest = Digest {
            week_start: week.start_date(),
            week_ending: week.end_date(),
            combined_text,
            weekly_summary,
            similar_research,
            research_directions,
            aside,
        };
        Ok((digest, similar.len()))
    }

    async fn complete(&self, model: &str, role: &str, user: &str, label: &str) -> Result<String> {
        let text = self
            .completer
            .complete(model, role, user)
            .await
            .with_context(|| format!("{} generation failed", label))?;
        if text.trim().is_empty() {
            bail!("{} generation returned no text", label);
        }
        Ok(text)
    }
}

/// Flat bulleted list of `title: document` pairs.
pub fn format_similar(similar: &[SimilarSummary]) -> String {
    similar
        .iter()
        .map(|s| format!("- {}: {}", s.metadata.title, s.document))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse the delimited weekly summary format.
///
/// Lines starting with `THEME:` become themes (`title :: summary`); a
/// `CONCLUSION:` line, plus any non-theme lines after it, becomes the
/// conclusion. Markdown bullets and bold markers around the prefixes are
/// tolerated. Without any theme line the response is kept opaque.
pub fn parse_weekly_summary(raw: &str) -> WeeklySummary {
    let mut themes = Vec::new();
    let mut conclusion: Option<String> = None;

    for line in raw.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(['-', '*', '#', ' '])
            .trim();

        if let Some(rest) = strip_prefix_ci(cleaned, THEME_PREFIX) {
            let rest = rest.trim_start_matches('*').trim();
            let (title, summary) = match rest.split_once(THEME_SEPARATOR) {
                Some((t, s)) => (t.trim(), s.trim()),
                None => (rest, ""),
            };
            if !title.is_empty() {
                themes.push(Theme {
                    title: title.to_string(),
                    summary: summary.to_string(),
                });
            }
        } else if let Some(rest) = strip_prefix_ci(cleaned, CONCLUSION_PREFIX) {
            conclusion = Some(rest.trim_start_matches('*').trim().to_string());
        } else if let Some(c) = conclusion.as_mut() {
            if !cleaned.is_empty() {
                if !c.is_empty() {
                    c.push(' ');
                }
                c.push_str(cleaned);
            }
        }
    }

    WeeklySummary {
        raw: raw.to_string(),
        themes,
        conclusion: conclusion.filter(|c| !c.is_empty()),
    }
}

fn strip_prefix_ci<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SummaryMetadata;
    use chrono::NaiveDate;

    #[test]
    fn parses_themes_and_conclusion() {
        let raw = "THEME: Graph learning :: GNNs scale further.\n\
                   - **THEME:** Protein folding :: Better structure priors.\n\
                   CONCLUSION: Structure matters.\nAcross fields.";
        let parsed = parse_weekly_summary(raw);
        assert_eq!(
            parsed.themes,
            vec![
                Theme {
                    title: "Graph learning".to_string(),
                    summary: "GNNs scale further.".to_string()
                },
                Theme {
                    title: "Protein folding".to_string(),
                    summary: "Better structure priors.".to_string()
                },
            ]
        );
        assert_eq!(
            parsed.conclusion.as_deref(),
            Some("Structure matters. Across fields.")
        );
        assert_eq!(parsed.raw, raw);
    }

    #[test]
    fn unstructured_response_stays_opaque() {
        let parsed = parse_weekly_summary("This week had many papers on things.");
        assert!(parsed.themes.is_empty());
        assert!(parsed.conclusion.is_none());
        assert_eq!(parsed.raw, "This week had many papers on things.");
    }

    #[test]
    fn theme_without_separator_keeps_title() {
        let parsed = parse_weekly_summary("theme: Robotics");
        assert_eq!(parsed.themes[0].title, "Robotics");
        assert_eq!(parsed.themes[0].summary, "");
    }

    #[test]
    fn similar_is_bulleted_title_document_pairs() {
        let meta = |t: &str| SummaryMetadata {
            title: t.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            source_file: format!("{}.pdf", t),
        };
        let list = format_similar(&[
            SimilarSummary {
                metadata: meta("a"),
                document: "first".to_string(),
                score: 0.9,
            },
            SimilarSummary {
                metadata: meta("b"),
                document: "second".to_string(),
                score: 0.5,
            },
        ]);
        assert_eq!(list, "- a: first\n- b: second");
        assert_eq!(format_similar(&[]), "");
    }

    #[test]
    fn prompts_embed_their_inputs() {
        assert!(weekly_prompt("ABS").ends_with("ABS"));
        let d = directions_prompt("WEEK", "- a: b");
        assert!(d.contains("Weekly Summary:\nWEEK"));
        assert!(d.contains("Similar Research:\n- a: b"));
    }
}
