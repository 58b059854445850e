use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::models::Document;

/// List documents directly inside `dir` whose extension matches.
///
/// The scan is non-recursive. The file's modification time is the only
/// temporal signal; nothing inside the document is consulted. Results are
/// sorted by file name for deterministic ordering.
pub fn scan_documents(dir: &Path, extension: &str) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        bail!("Papers directory does not exist: {}", dir.display());
    }

    let include_set = build_globset(extension)?;

    let mut docs = Vec::new();

    let walker = WalkDir::new(dir).min_depth(1).max_depth(1);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if !include_set.is_match(&name) {
            continue;
        }

        let metadata = entry.metadata()?;
        let modified = metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);

        docs.push(Document {
            path: entry.path().to_path_buf(),
            modified: DateTime::<Utc>::from(modified),
        });
    }

    docs.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));

    Ok(docs)
}

fn build_globset(extension: &str) -> Result<GlobSet> {
    let ext = extension.trim_start_matches('.');
    let mut builder = GlobSetBuilder::new();
    builder.add(Glob::new(&format!("*.{}", ext))?);
    Ok(builder.build()?)
}
