//! Sliding-window text chunker.
//!
//! Splits normalized document text into overlapping [`Chunk`]s of at most
//! `size` characters. Consecutive chunks share exactly `overlap` characters,
//! so the original text can be rebuilt with [`reassemble`].
//!
//! Each chunk receives a UUID plus a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Start a window at character 0.
//! 2. Emit the next `size` characters (fewer at the end of the text).
//! 3. Stop if the window reached the end of the text, otherwise advance the
//!    window start by `size - overlap` characters and repeat.
//!
//! Lengths are counted in `char`s so a window never splits a UTF-8 sequence.
//!
//! # Example
//!
//! ```rust
//! use course_assistant_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(4, 1).unwrap();
//! let texts: Vec<String> = chunker.chunks("doc", "abcdefghij").map(|c| c.text).collect();
//! assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Validated `(size, overlap)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] if `size == 0` or `overlap >= size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidConfiguration(
                "chunk size must be > 0".to_string(),
            ));
        }
        if overlap >= size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({size})"
            )));
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Characters the window advances between chunks.
    pub fn step(&self) -> usize {
        self.size - self.overlap
    }

    /// Lazily chunk `text`. The returned iterator is `Clone`, and calling
    /// this again yields the same windows from the start.
    pub fn chunks<'a>(&self, document_id: &'a str, text: &'a str) -> Chunks<'a> {
        Chunks {
            document_id,
            text,
            size: self.size,
            step: self.step(),
            overlap: self.overlap,
            byte_pos: 0,
            char_pos: 0,
            index: 0,
            done: false,
        }
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Convenience wrapper: validate `(size, overlap)` and collect all chunks.
pub fn chunk_text(document_id: &str, text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(size, overlap)?.chunks(document_id, text).collect())
}

/// Iterator over the windows of one document. Created by [`Chunker::chunks`].
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    document_id: &'a str,
    text: &'a str,
    size: usize,
    step: usize,
    overlap: usize,
    byte_pos: usize,
    char_pos: usize,
    index: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let rest = &self.text[self.byte_pos..];
        let end = byte_offset_of_char(rest, self.size);
        let overlap = if self.index == 0 { 0 } else { self.overlap };
        let chunk = make_chunk(
            self.document_id,
            self.index,
            self.char_pos,
            &rest[..end],
            overlap,
        );

        if end == rest.len() {
            self.done = true;
        } else {
            self.byte_pos += byte_offset_of_char(rest, self.step);
            self.char_pos += self.step;
        }
        self.index += 1;

        Some(chunk)
    }
}

impl std::iter::FusedIterator for Chunks<'_> {}

/// Rebuild document text from its chunks by dropping each chunk's overlap.
///
/// Chunks must be in `chunk_index` order and belong to one document.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        let skip = byte_offset_of_char(&chunk.text, chunk.overlap);
        out.push_str(&chunk.text[skip..]);
    }
    out
}

/// Byte offset of the `n`th char of `s`, or `s.len()` if `s` is shorter.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(document_id: &str, index: usize, char_start: usize, text: &str, overlap: usize) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        char_start,
        text: text.to_string(),
        overlap,
        hash,
    }
}
