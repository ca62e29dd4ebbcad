//! `assist index` and `assist search`.
//!
//! The index lives in memory only, so both commands scan and index the
//! corpus on every run.

use anyhow::{bail, Result};
use course_assistant_core::Error;
use tracing::warn;

use crate::config::Config;
use crate::corpus::{scan_corpus, CorpusScan};
use crate::session::SessionContext;

/// Scan and chunk the corpus, and embed it unless `dry_run` is set.
pub async fn run_index(config: &Config, dry_run: bool) -> Result<()> {
    let scan = scan_corpus(&config.corpus)?;
    print_skipped(&scan);

    let chunker = config.chunking.chunker()?;
    let chunk_count: usize = scan
        .documents
        .iter()
        .map(|doc| chunker.chunks(&doc.id, &doc.text).count())
        .sum();

    if dry_run {
        println!("Dry run: corpus scan");
        println!("  documents: {}", scan.documents.len());
        println!("  skipped:   {}", scan.skipped.len());
        println!(
            "  chunks:    {} (size {}, overlap {})",
            chunk_count,
            chunker.size(),
            chunker.overlap()
        );
        return Ok(());
    }

    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config to build an index.");
    }

    let mut session = SessionContext::from_config(config)?;
    match session.build_index(&scan.documents).await {
        Ok(summary) => {
            println!("Index built.");
            println!("  documents: {}", summary.documents);
            println!("  chunks:    {}", summary.chunks);
            match summary.dims {
                Some(dims) => println!("  dims:      {}", dims),
                None => println!("  dims:      -"),
            }
        }
        Err(Error::EmptyCorpus) => {
            println!("No documents found; nothing to index.");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

/// Index the corpus and print the top `k` chunks for `query`.
pub async fn run_search(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Search requires an embedding provider. Set [embedding] provider in config.");
    }

    let mut session = SessionContext::from_config(config)?;
    prepare_index(&mut session, config).await?;

    let k = k.unwrap_or(config.retrieval.k);
    let results = session.search(query, k).await?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.4}] {}, chunk {}",
            i + 1,
            result.score,
            result.chunk.document_id,
            result.chunk.chunk_index
        );
        println!("    {}", snippet(&result.chunk.text, 160));
        println!();
    }

    Ok(())
}

/// Scan the corpus and build the session index.
///
/// An empty corpus or a disabled embedding provider leaves the session
/// without context; other build errors are returned.
pub async fn prepare_index(session: &mut SessionContext, config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        warn!("embedding provider disabled; answering without course material");
        return Ok(());
    }

    let scan = scan_corpus(&config.corpus)?;
    match session.build_index(&scan.documents).await {
        Ok(_) | Err(Error::EmptyCorpus) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn print_skipped(scan: &CorpusScan) {
    for (path, reason) in &scan.skipped {
        println!("skipped {}: {}", path, reason);
    }
}

/// First `max_chars` characters of `text` on a single line.
fn snippet(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    let mut out: String = flat.chars().take(max_chars).collect();
    if flat.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}
