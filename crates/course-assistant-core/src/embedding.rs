//! Embedding provider trait and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait that all embedding backends
//! implement, the [`embed_texts`] entry point that enforces the batch
//! contract, and cosine similarity.
//!
//! Concrete provider implementations (Gemini, OpenAI, Ollama) live in the
//! `course-assistant` app crate.

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Trait for embedding providers.
///
/// Implementations turn an ordered batch of texts into one vector per text,
/// in the same order. They should map provider rate limits to
/// [`Error::RateLimited`] and every other failure to
/// [`Error::EmbeddingService`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;
    /// Returns the expected vector dimensionality (e.g. `768`), or `0` if the
    /// provider does not fix one.
    fn dims(&self) -> usize;
    /// Embed a non-empty batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a batch of texts through `provider`.
///
/// An empty batch is a no-op: it returns an empty vector and the provider is
/// not called. A provider answering with a different number of vectors than
/// inputs is reported as [`Error::EmbeddingService`], and a vector whose
/// length differs from a non-zero [`EmbeddingProvider::dims`] as
/// [`Error::DimensionMismatch`].
pub async fn embed_texts(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
) -> Result<Vec<Vec<f32>>> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }

    let vectors = provider.embed(texts).await?;
    if vectors.len() != texts.len() {
        return Err(Error::EmbeddingService(format!(
            "provider '{}' returned {} vectors for {} inputs",
            provider.model_name(),
            vectors.len(),
            texts.len()
        )));
    }

    let expected = provider.dims();
    if expected > 0 {
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(Error::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }
    }
    Ok(vectors)
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    embed_texts(provider, &[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| Error::EmbeddingService("empty embedding response".to_string()))
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero-magnitude vectors, or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
