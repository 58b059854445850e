//! Report rendering.
//!
//! A [`DigestRenderer`] turns a composed [`Digest`] into the text of the
//! weekly report; [`write_digest`] puts it at `summary_<date>.<ext>` in the
//! output directory, replacing any earlier report for the same date.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::models::Digest;

const TITLE: &str = "Weekly Research Summary";
const SUBTITLE: &str = "A summary of recent research across the papers collected this week.";
const SIMILAR_HEADING: &str = "Similar Research";
const NEXT_STEPS_HEADING: &str = "Next Steps";
const ASIDE_HEADING: &str = "Joke of the Week";
const NO_SIMILAR: &str = "No related prior summaries in the index yet.";
const FOOTER: &str = ":: Weekly Research Digest ::";

pub trait DigestRenderer {
    /// File extension of rendered reports, without the dot.
    fn extension(&self) -> &str;
    fn render(&self, digest: &Digest) -> Result<String>;
}

/// Markdown report with a fixed section layout.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

impl DigestRenderer for MarkdownRenderer {
    fn extension(&self) -> &str {
        "md"
    }

    fn render(&self, digest: &Digest) -> Result<String> {
        let mut out = String::new();

        writeln!(out, "# {}", TITLE)?;
        writeln!(out)?;
        writeln!(out, "#### {}", SUBTITLE)?;
        writeln!(out)?;
        writeln!(
            out,
            "***Week of {} to {}***",
            digest.week_start, digest.week_ending
        )?;
        writeln!(out)?;

        let summary = &digest.weekly_summary;
        if summary.themes.is_empty() {
            writeln!(out, "{}", summary.raw.trim())?;
            writeln!(out)?;
        } else {
            for theme in &summary.themes {
                writeln!(out, "### {}", theme.title)?;
                if !theme.summary.is_empty() {
                    writeln!(out)?;
                    writeln!(out, "{}", theme.summary)?;
                }
                writeln!(out)?;
            }
            if let Some(conclusion) = &summary.conclusion {
                writeln!(out, "{}", conclusion)?;
                writeln!(out)?;
            }
        }

        writeln!(out, "## {}", SIMILAR_HEADING)?;
        writeln!(out)?;
        if digest.similar_research.trim().is_empty() {
            writeln!(out, "{}", NO_SIMILAR)?;
        } else {
            writeln!(out, "{}", digest.similar_research.trim_end())?;
        }
        writeln!(out)?;

        writeln!(out, "## {}", NEXT_STEPS_HEADING)?;
        writeln!(out)?;
        writeln!(out, "{}", digest.research_directions.trim())?;
        writeln!(out)?;

        writeln!(out, "## {}", ASIDE_HEADING)?;
        writeln!(out)?;
        writeln!(out, "{}", digest.aside.trim())?;
        writeln!(out)?;

        writeln!(out, "{}", FOOTER)?;

        Ok(out)
    }
}

/// `<dir>/summary_<YYYY-MM-DD>.<ext>`
pub fn output_path(dir: &Path, date: NaiveDate, extension: &str) -> PathBuf {
    dir.join(format!("summary_{}.{}", date.format("%Y-%m-%d"), extension))
}

/// Render and write the report, creating `dir` if needed.
pub fn write_digest(renderer: &dyn DigestRenderer, digest: &Digest, dir: &Path) -> Result<PathBuf> {
    let content = renderer.render(digest)?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = output_path(dir, digest.week_ending, renderer.extension());
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write digest: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Theme, WeeklySummary};

    fn digest(themes: Vec<Theme>, similar: &str) -> Digest {
        Digest {
            week_start: NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
            week_ending: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            combined_text: "ABSTRACT\nWe study X.".to_string(),
            weekly_summary: WeeklySummary {
                raw: "Opaque weekly text.".to_string(),
                themes,
                conclusion: Some("All told, X matters.".to_string()),
            },
            similar_research: similar.to_string(),
            research_directions: "Study Y next.".to_string(),
            aside: "Why did the p-value break up?".to_string(),
        }
    }

    #[test]
    fn renders_themes_and_sections_in_order() {
        let d = digest(
            vec![
                Theme {
                    title: "Graphs".to_string(),
                    summary: "GNNs everywhere.".to_string(),
                },
                Theme {
                    title: "Proteins".to_string(),
                    summary: String::new(),
                },
            ],
            "- gnn: graph nets",
        );
        let text = MarkdownRenderer.render(&d).unwrap();

        let order = [
            "# Weekly Research Summary",
            "### Graphs",
            "GNNs everywhere.",
            "### Proteins",
            "All told, X matters.",
            "## Similar Research",
            "- gnn: graph nets",
            "## Next Steps",
            "Study Y next.",
            "## Joke of the Week",
            FOOTER,
        ];
        let mut at = 0;
        for needle in order {
            let pos = text[at..].find(needle).unwrap_or_else(|| panic!("missing {}", needle));
            at += pos + needle.len();
        }
        assert!(!text.contains("Opaque weekly text."));
    }

    #[test]
    fn opaque_summary_rendered_when_no_themes() {
        let text = MarkdownRenderer.render(&digest(vec![], "")).unwrap();
        assert!(text.contains("Opaque weekly text."));
        assert!(text.contains(NO_SIMILAR));
    }

    #[test]
    fn write_overwrites_same_date() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("weekly");
        let mut d = digest(vec![], "");
        let first = write_digest(&MarkdownRenderer, &d, &out).unwrap();
        assert_eq!(first, out.join("summary_2024-03-15.md"));

        d.research_directions = "Second run.".to_string();
        let second = write_digest(&MarkdownRenderer, &d, &out).unwrap();
        assert_eq!(first, second);
        assert!(std::fs::read_to_string(&second).unwrap().contains("Second run."));
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }
}
