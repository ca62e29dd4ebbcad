//! # Course Assistant
//!
//! A conversational course assistant with retrieval over course material.
//!
//! Documents from a corpus directory are chunked, embedded, and held in an
//! in-memory vector index. Each question retrieves the most similar chunks,
//! which are injected into the system instruction (the course "syllabus")
//! before the hosted model is called. Token usage is priced per turn and
//! accumulated per session.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Corpus    │──▶│ Chunk+Embed  │──▶│ Vector Index │
//! │ PDF/TXT/MD  │   │  (provider)  │   │  (in memory) │
//! └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                             │ top-k
//!                   ┌──────────────┐   ┌──────▼───────┐
//!   question ──────▶│   Session    │──▶│ Prompt + LLM │──▶ answer + cost
//!                   └──────────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! assist index --dry-run            # scan and chunk the corpus
//! assist search "recursion" --k 5   # ranked chunks
//! assist ask "When is the midterm?"
//! assist chat                       # interactive session
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`syllabus`] | System instruction loading |
//! | [`corpus`] | Corpus directory scanning |
//! | [`extract`] | PDF and text extraction |
//! | [`embedding`] | Embedding provider adapters |
//! | [`generation`] | Gemini generation adapter |
//! | [`retry`] | Single-retry policy |
//! | [`session`] | Per-session state and turns |
//!
//! Pure pipeline logic (chunking, index, prompt assembly, cost accounting)
//! lives in the `course-assistant-core` crate.

pub mod chat;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod extract;
pub mod generation;
pub mod http;
pub mod index_cmd;
pub mod retry;
pub mod session;
pub mod syllabus;
