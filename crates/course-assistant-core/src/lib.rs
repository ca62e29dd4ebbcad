//! # Course Assistant Core
//!
//! Provider-agnostic logic for the course assistant: data models, chunking,
//! the embedding and generation provider traits, the in-memory vector index,
//! conversation state, prompt assembly, and token-cost accounting.
//!
//! This crate contains no tokio, HTTP, or filesystem I/O. Concrete providers,
//! configuration and the session lifecycle live in the `course-assistant`
//! app crate.
//!
//! ## Pipeline
//!
//! ```text
//! Document ──▶ Chunker ──▶ EmbeddingProvider ──▶ VectorIndex
//!                                                    │ query
//!                                                    ▼
//!  ConversationState ─────────────────────────▶ build_prompt ──▶ GenerationProvider
//!                                                                      │ usage
//!                                                                      ▼
//!                                                              UsageAccumulator
//! ```

pub mod chunk;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod models;
pub mod prompt;
pub mod usage;

pub use error::{Error, Result, Service};
