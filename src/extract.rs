//! Page text extraction and abstract location.
//!
//! PDF parsing is delegated to `pdf-extract`; this module only turns a file
//! into page-ordered text and then finds the abstract span in it. The span
//! finder is a heuristic: it starts at the first case-insensitive
//! occurrence of "abstract" and stops at the first blank line. A miss is
//! `None`, never an error.

use std::path::Path;
use thiserror::Error;

/// Literal marker that opens the abstract span.
const ABSTRACT_MARKER: &str = "abstract";
/// Separator that closes the abstract span.
const PARAGRAPH_BREAK: &str = "\n\n";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: String, message: String },
}

/// Produces page-ordered text for one document.
pub trait PageExtractor {
    fn pages(&self, path: &Path) -> Result<Vec<String>, ExtractError>;
}

/// [`PageExtractor`] backed by `pdf-extract`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfPageExtractor;

impl PageExtractor for PdfPageExtractor {
    fn pages(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
            path: path.display().to_string(),
            source,
        })?;
        pdf_pages_from_mem(&bytes).map_err(|message| ExtractError::Pdf {
            path: path.display().to_string(),
            message,
        })
    }
}

fn pdf_pages_from_mem(bytes: &[u8]) -> Result<Vec<String>, String> {
    pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| e.to_string())
}

/// Locate the abstract in page-ordered text.
///
/// Scans pages in order; on the first page containing the marker, returns
/// the text from the marker to the end of that page, cut at the first blank
/// line. Original casing is kept. Zero pages, or no page with the marker,
/// yields `None`.
pub fn find_abstract<S: AsRef<str>>(pages: &[S]) -> Option<String> {
    pages.iter().find_map(|page| abstract_in_page(page.as_ref()))
}

fn abstract_in_page(text: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let start = text.to_ascii_lowercase().find(ABSTRACT_MARKER)?;
    let tail = &text[start..];
    let span = match tail.find(PARAGRAPH_BREAK) {
        Some(end) => &tail[..end],
        None => tail,
    };
    Some(span.to_string())
}

/// Extract pages and locate the abstract for the file at `path`.
pub fn extract_abstract(
    extractor: &dyn PageExtractor,
    path: &Path,
) -> Result<Option<String>, ExtractError> {
    let pages = extractor.pages(path)?;
    Ok(find_abstract(&pages))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_abstract_up_to_blank_line() {
        let pages = ["Intro\n\nABSTRACT\nWe study X.\n\nConclusion"];
        assert_eq!(
            find_abstract(&pages).as_deref(),
            Some("ABSTRACT\nWe study X.")
        );
    }

    #[test]
    fn marker_is_case_insensitive_but_text_keeps_casing() {
        let pages = ["Title\nAbStRaCt: We Propose Y"];
        assert_eq!(
            find_abstract(&pages).as_deref(),
            Some("AbStRaCt: We Propose Y")
        );
    }

    #[test]
    fn first_matching_page_wins() {
        let pages = [
            "Cover page",
            "abstract one\n\nbody",
            "abstract two\n\nmore",
        ];
        assert_eq!(find_abstract(&pages).as_deref(), Some("abstract one"));
    }

    #[test]
    fn span_runs_to_end_of_page_without_blank_line() {
        let pages = ["Abstract\nline one\nline two", "next page"];
        assert_eq!(
            find_abstract(&pages).as_deref(),
            Some("Abstract\nline one\nline two")
        );
    }

    #[test]
    fn no_marker_is_none() {
        let pages = ["Introduction\n\nMethods", "Results"];
        assert_eq!(find_abstract(&pages), None);
    }

    #[test]
    fn zero_pages_is_none() {
        let pages: [&str; 0] = [];
        assert_eq!(find_abstract(&pages), None);
    }

    #[test]
    fn non_ascii_prefix_keeps_offsets() {
        let pages = ["Über die Sache\nAbstract: ein Test\n\nRest"];
        assert_eq!(
            find_abstract(&pages).as_deref(),
            Some("Abstract: ein Test")
        );
    }

    #[test]
    fn unreadable_file_is_an_error_not_a_panic() {
        let err = PdfPageExtractor
            .pages(Path::new("/definitely/not/here.pdf"))
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not a pdf").unwrap();
        let err = PdfPageExtractor.pages(tmp.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf { .. }));
    }
}
