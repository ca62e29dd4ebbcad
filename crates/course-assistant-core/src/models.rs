//! Core data models shared across the retrieval pipeline.
//!
//! These types represent the documents and chunks that flow from the corpus
//! through the chunker into the vector index.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A normalized source document.
///
/// Built once per corpus item; the text is normalized on construction and
/// never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Source identifier, e.g. the path relative to the corpus root.
    pub id: String,
    pub title: Option<String>,
    pub content_type: String,
    pub text: String,
}

impl Document {
    /// Create a document, normalizing `raw_text` with [`normalize_text`].
    pub fn new(
        id: impl Into<String>,
        title: Option<String>,
        content_type: impl Into<String>,
        raw_text: &str,
    ) -> Self {
        Self {
            id: id.into(),
            title,
            content_type: content_type.into(),
            text: normalize_text(raw_text),
        }
    }
}

/// A bounded window of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk UUID.
    pub id: String,
    /// Owning [`Document::id`].
    pub document_id: String,
    /// Position within the document, contiguous from 0.
    pub chunk_index: usize,
    /// Character offset of the first character of `text` in the document.
    pub char_start: usize,
    pub text: String,
    /// Characters shared with the previous chunk (0 for the first chunk).
    pub overlap: usize,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    /// Number of characters (not bytes) in the chunk text.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Normalize extracted text before chunking.
///
/// - `\r\n` and lone `\r` become `\n`
/// - NUL characters are removed
/// - trailing whitespace is stripped from every line
/// - runs of three or more newlines collapse to a blank line
/// - leading and trailing whitespace is trimmed
pub fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n").replace('\0', "");

    let mut out = String::with_capacity(unified.len());
    let mut blank_run = 0usize;
    for line in unified.split('\n') {
        let line = line.trim_end();
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim().to_string()
}

/// SHA-256 over document ids and texts, hex encoded.
///
/// Identifies a corpus so an index build can be skipped when nothing changed.
pub fn corpus_fingerprint(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        hasher.update(doc.id.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_line_endings() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_normalize_collapses_blank_runs() {
        assert_eq!(normalize_text("one\n\n\n\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn test_normalize_trims_trailing_spaces_and_nul() {
        assert_eq!(normalize_text("  lead\0 \ntail   \n\n"), "lead\ntail");
    }

    #[test]
    fn test_document_new_normalizes() {
        let doc = Document::new("notes.txt", None, "text/plain", "Week 1\r\n\r\n\r\nRecursion  ");
        assert_eq!(doc.text, "Week 1\n\nRecursion");
        assert_eq!(doc.title, None);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = Document::new("a.txt", None, "text/plain", "alpha");
        let b = Document::new("b.txt", None, "text/plain", "beta");
        let b2 = Document::new("b.txt", None, "text/plain", "beta v2");
        assert_eq!(
            corpus_fingerprint(&[a.clone(), b.clone()]),
            corpus_fingerprint(&[a.clone(), b])
        );
        assert_ne!(corpus_fingerprint(&[a.clone()]), corpus_fingerprint(&[a, b2]));
        assert_eq!(corpus_fingerprint(&[]).len(), 64);
    }

    #[test]
    fn test_char_len_counts_chars() {
        let chunk = Chunk {
            id: "c".into(),
            document_id: "d".into(),
            chunk_index: 0,
            char_start: 0,
            text: "héllo".into(),
            overlap: 0,
            hash: String::new(),
        };
        assert_eq!(chunk.char_len(), 5);
    }
}
