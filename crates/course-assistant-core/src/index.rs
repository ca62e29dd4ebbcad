//! In-memory vector index over embedded chunks.
//!
//! The index is append-only and lives for one session. Vector search is
//! brute-force cosine similarity over all entries, which is plenty for a
//! course-sized corpus.
//!
//! # Dimension invariant
//!
//! The index adopts the dimension of the first vector inserted and rejects
//! every later vector of another dimension with
//! [`Error::DimensionMismatch`]. A query vector is checked once against that
//! dimension before scoring, so results never mix dimensions.
//!
//! # Ordering
//!
//! Results are sorted by descending score. Equal scores keep insertion order
//! (the sort is stable).

use tracing::debug;

use crate::embedding::{cosine_similarity, embed_query, embed_texts, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::models::Chunk;

/// Default number of chunks embedded per provider call.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A chunk together with its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// Append-only collection of [`EmbeddedChunk`]s.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    dims: Option<usize>,
    model: Option<String>,
    entries: Vec<EmbeddedChunk>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed `chunks` in batches of `batch_size` and index them in order.
    ///
    /// An empty chunk sequence produces an empty index without calling the
    /// provider.
    pub async fn build<I>(
        chunks: I,
        provider: &dyn EmbeddingProvider,
        batch_size: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = Chunk>,
    {
        if batch_size == 0 {
            return Err(Error::InvalidConfiguration(
                "embedding batch size must be > 0".to_string(),
            ));
        }

        let mut index = Self::new();
        let mut pending: Vec<Chunk> = Vec::with_capacity(batch_size);

        for chunk in chunks {
            pending.push(chunk);
            if pending.len() == batch_size {
                index.embed_batch(provider, std::mem::take(&mut pending)).await?;
            }
        }
        if !pending.is_empty() {
            index.embed_batch(provider, pending).await?;
        }

        if !index.is_empty() {
            index.model = Some(provider.model_name().to_string());
        }
        debug!(
            entries = index.len(),
            dims = ?index.dims,
            model = provider.model_name(),
            "vector index built"
        );
        Ok(index)
    }

    async fn embed_batch(
        &mut self,
        provider: &dyn EmbeddingProvider,
        batch: Vec<Chunk>,
    ) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_texts(provider, &texts).await?;
        for (chunk, vector) in batch.into_iter().zip(vectors) {
            self.insert(chunk, vector)?;
        }
        Ok(())
    }

    /// Append one entry.
    ///
    /// # Errors
    ///
    /// [`Error::DimensionMismatch`] if `vector` differs from the index
    /// dimension, or [`Error::InvariantViolation`] for an empty vector.
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::InvariantViolation(format!(
                "empty embedding vector for chunk {}",
                chunk.id
            )));
        }
        match self.dims {
            Some(expected) if expected != vector.len() => {
                return Err(Error::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
            Some(_) => {}
            None => self.dims = Some(vector.len()),
        }
        self.entries.push(EmbeddedChunk { chunk, vector });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension, known once the first entry is inserted.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Embedding model the index was built with, if built via [`build`](Self::build).
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn entries(&self) -> &[EmbeddedChunk] {
        &self.entries
    }

    /// Rank entries against a pre-computed query vector and keep the top `k`.
    ///
    /// Returns an empty result for an empty index or `k == 0`.
    pub fn search(&self, query_vec: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let Some(dims) = self.dims else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }
        if query_vec.len() != dims {
            return Err(Error::DimensionMismatch {
                expected: dims,
                actual: query_vec.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query_vec, &e.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }

    /// Embed `query_text` and return the `k` most similar chunks.
    ///
    /// On an empty index this returns an empty result without calling the
    /// provider.
    pub async fn query(
        &self,
        provider: &dyn EmbeddingProvider,
        query_text: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(provider, query_text).await?;
        self.search(&query_vec, k)
    }
}
