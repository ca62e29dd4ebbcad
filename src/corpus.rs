//! Document corpus scanning.
//!
//! Walks the configured corpus directory, filters files with include and
//! exclude globs, extracts plain text, and returns normalized
//! [`Document`]s sorted by relative path. Files that cannot be read or
//! extracted are skipped with a warning and reported in
//! [`CorpusScan::skipped`].

use anyhow::Result;
use course_assistant_core::models::Document;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::extract::{content_type_for, extract_text};

/// Result of one corpus scan.
#[derive(Debug, Default)]
pub struct CorpusScan {
    pub documents: Vec<Document>,
    /// `(relative path, reason)` for every file left out.
    pub skipped: Vec<(String, String)>,
}

/// Scan the corpus directory.
///
/// No configured root, or a root that does not exist, yields an empty scan:
/// the assistant then answers without retrieved context.
pub fn scan_corpus(config: &CorpusConfig) -> Result<CorpusScan> {
    let Some(root) = config.root.as_deref() else {
        debug!("no corpus root configured");
        return Ok(CorpusScan::default());
    };
    if !root.exists() {
        warn!(root = %root.display(), "corpus root does not exist; continuing without documents");
        return Ok(CorpusScan::default());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/.*".to_string()];
    default_excludes.extend(config.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&default_excludes)?;

    let mut scan = CorpusScan::default();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match load_document(path, &rel_str) {
            Ok(doc) if doc.text.is_empty() => {
                warn!(file = %rel_str, "no text extracted; skipping");
                scan.skipped.push((rel_str, "no text extracted".to_string()));
            }
            Ok(doc) => scan.documents.push(doc),
            Err(reason) => {
                warn!(file = %rel_str, %reason, "skipping corpus file");
                scan.skipped.push((rel_str, reason));
            }
        }
    }

    scan.documents.sort_by(|a, b| a.id.cmp(&b.id));
    info!(
        documents = scan.documents.len(),
        skipped = scan.skipped.len(),
        root = %root.display(),
        "corpus scanned"
    );

    Ok(scan)
}

fn load_document(path: &Path, relative_path: &str) -> std::result::Result<Document, String> {
    let content_type =
        content_type_for(path).ok_or_else(|| "unsupported file type".to_string())?;
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    let text = extract_text(&bytes, content_type).map_err(|e| e.to_string())?;

    let title = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string());

    Ok(Document::new(relative_path, title, content_type, &text))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
