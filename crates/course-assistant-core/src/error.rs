//! Error types for the assistant core.

use std::fmt;

use thiserror::Error;

/// External service a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Embedding,
    Generation,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Embedding => write!(f, "embedding"),
            Service::Generation => write!(f, "generation"),
        }
    }
}

/// Main error type for assistant operations.
///
/// | Variant | Severity |
/// |---------|----------|
/// | [`InvalidConfiguration`](Error::InvalidConfiguration) | fatal, raised before any provider call |
/// | [`EmbeddingService`](Error::EmbeddingService) / [`GenerationService`](Error::GenerationService) | retried once, then surfaced for the turn |
/// | [`RateLimited`](Error::RateLimited) | retried once after a bounded delay |
/// | [`EmptyCorpus`](Error::EmptyCorpus) | not fatal; retrieval yields no context |
/// | [`DimensionMismatch`](Error::DimensionMismatch) / [`InvariantViolation`](Error::InvariantViolation) | programming errors |
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Bad chunking, retrieval, pricing, or provider settings.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Transport or provider failure while embedding.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// Transport or provider failure while generating.
    #[error("generation service error: {0}")]
    GenerationService(String),

    /// The provider signalled a rate limit (HTTP 429 or equivalent).
    #[error("{service} service rate limited: {message}")]
    RateLimited { service: Service, message: String },

    /// The corpus contained no documents to index.
    #[error("corpus contains no documents to index")]
    EmptyCorpus,

    /// A vector's dimension differs from the index dimension.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An internal contract was broken (e.g. an unknown role string).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl Error {
    /// Build the service-specific error for a non-rate-limit failure.
    pub fn service(service: Service, message: impl Into<String>) -> Self {
        match service {
            Service::Embedding => Error::EmbeddingService(message.into()),
            Service::Generation => Error::GenerationService(message.into()),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// Whether a single retry may succeed (transport failures and rate limits).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimited { .. } | Error::EmbeddingService(_) | Error::GenerationService(_)
        )
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
