//! Per-session assistant state and the question/answer turn.
//!
//! A [`SessionContext`] owns everything one conversation needs: the
//! conversation history, the usage accumulator, the vector index, and
//! handles to the embedding and generation providers. Sessions never share
//! any of it.
//!
//! # Turn flow
//!
//! ```text
//! prompt ──▶ append user turn
//!        ──▶ retrieve top-k chunks (if an index is ready)
//!        ──▶ build prompt (context in the system instruction)
//!        ──▶ generate (retried once on a retryable error)
//!        ──▶ append assistant turn + record usage
//! ```
//!
//! The user turn stays in the history when the turn fails. The assistant
//! turn and token counts are written only after generation completes, so a
//! failed or cancelled turn never records partial usage.

use std::sync::Arc;

use course_assistant_core::chunk::Chunker;
use course_assistant_core::conversation::{ConversationState, Role};
use course_assistant_core::embedding::EmbeddingProvider;
use course_assistant_core::generation::{collect_stream, Generation, GenerationProvider};
use course_assistant_core::index::{ScoredChunk, VectorIndex, DEFAULT_BATCH_SIZE};
use course_assistant_core::models::{corpus_fingerprint, Chunk, Document};
use course_assistant_core::prompt::{build_prompt, PromptPayload, DEFAULT_MAX_CONTEXT_CHARS};
use course_assistant_core::usage::{TokenRates, TokenUsage, UsageAccumulator};
use course_assistant_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::embedding::create_provider;
use crate::generation::create_generator;
use crate::retry::{RetryPolicy, RetryingEmbedder};
use crate::syllabus::{load_syllabus, Syllabus};

/// Retrieval, pricing, and retry knobs for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub chunker: Chunker,
    pub k: usize,
    pub max_context_chars: usize,
    pub batch_size: usize,
    pub rates: TokenRates,
    pub retry: RetryPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunker: Chunker::default(),
            k: 3,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            batch_size: DEFAULT_BATCH_SIZE,
            rates: TokenRates::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            chunker: config.chunking.chunker()?,
            k: config.retrieval.k,
            max_context_chars: config.retrieval.max_context_chars,
            batch_size: config.retrieval.batch_size,
            rates: config.pricing.rates(),
            retry: RetryPolicy::from_config(&config.retry),
        })
    }
}

/// Counts reported by [`SessionContext::build_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSummary {
    pub documents: usize,
    pub chunks: usize,
    pub dims: Option<usize>,
}

#[derive(Debug)]
enum IndexState {
    Unbuilt,
    Ready {
        fingerprint: String,
        documents: usize,
        index: VectorIndex,
    },
    /// Build failed for this corpus; the error is replayed instead of
    /// rebuilding.
    Failed { fingerprint: String, error: Error },
}

/// Result of one successful turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub text: String,
    /// Token counts, when the provider reported them.
    pub usage: Option<TokenUsage>,
    /// Cost of this turn; `None` without usage.
    pub cost: Option<f64>,
    /// Retrieved chunks that made it into the prompt, best first.
    pub sources: Vec<ScoredChunk>,
    /// Retrieved chunks dropped to respect the context limit.
    pub dropped_chunks: usize,
}

pub struct SessionContext {
    syllabus: Syllabus,
    conversation: ConversationState,
    usage: UsageAccumulator,
    index: IndexState,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    settings: SessionSettings,
}

impl SessionContext {
    pub fn new(
        syllabus: Syllabus,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            syllabus,
            conversation: ConversationState::new(),
            usage: UsageAccumulator::new(),
            index: IndexState::Unbuilt,
            embedder,
            generator,
            settings,
        }
    }

    /// Load the syllabus and create the configured providers.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let syllabus = load_syllabus(&config.assistant.syllabus_path)?;
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        let settings = SessionSettings::from_config(config)?;
        info!(
            syllabus = %syllabus.version,
            embedding = embedder.model_name(),
            generation = generator.model_name(),
            "session created"
        );
        Ok(Self::new(syllabus, embedder, generator, settings))
    }

    pub fn syllabus(&self) -> &Syllabus {
        &self.syllabus
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn usage(&self) -> &UsageAccumulator {
        &self.usage
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// The current index, if a build has succeeded (possibly empty).
    pub fn index(&self) -> Option<&VectorIndex> {
        match &self.index {
            IndexState::Ready { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Clear the conversation and usage totals. The index is kept.
    pub fn reset(&mut self) {
        self.conversation.clear();
        self.usage.reset();
        debug!("session reset");
    }

    /// Chunk, embed, and index `documents`, replacing the current index.
    ///
    /// Each embedding batch is retried once on a retryable error. Rebuilding
    /// the corpus that is already indexed is a no-op. A corpus whose build
    /// still failed after that retry returns the same error again without
    /// calling the embedder.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyCorpus`] for zero documents; the session then holds an
    /// empty index and answers without context. Embedding failures are
    /// returned as-is.
    pub async fn build_index(&mut self, documents: &[Document]) -> Result<IndexSummary> {
        let fingerprint = corpus_fingerprint(documents);

        match &self.index {
            IndexState::Ready {
                fingerprint: current,
                documents: count,
                index,
            } if *current == fingerprint && !index.is_empty() => {
                debug!("corpus unchanged; keeping index");
                return Ok(IndexSummary {
                    documents: *count,
                    chunks: index.len(),
                    dims: index.dims(),
                });
            }
            IndexState::Failed {
                fingerprint: failed,
                error,
            } if *failed == fingerprint => {
                warn!(%error, "index build previously failed for this corpus");
                return Err(error.clone());
            }
            _ => {}
        }

        if documents.is_empty() {
            warn!("corpus is empty; answering without course material");
            self.index = IndexState::Ready {
                fingerprint,
                documents: 0,
                index: VectorIndex::new(),
            };
            return Err(Error::EmptyCorpus);
        }

        let chunks = self.chunk_documents(documents);
        let chunk_count = chunks.len();
        let embedder = RetryingEmbedder::new(self.embedder.as_ref(), self.settings.retry);
        let built = VectorIndex::build(chunks, &embedder, self.settings.batch_size).await;

        match built {
            Ok(index) => {
                let summary = IndexSummary {
                    documents: documents.len(),
                    chunks: index.len(),
                    dims: index.dims(),
                };
                info!(
                    documents = summary.documents,
                    chunks = summary.chunks,
                    dims = ?summary.dims,
                    "index built"
                );
                self.index = IndexState::Ready {
                    fingerprint,
                    documents: documents.len(),
                    index,
                };
                Ok(summary)
            }
            Err(error) => {
                warn!(%error, chunks = chunk_count, "index build failed");
                self.index = IndexState::Failed {
                    fingerprint,
                    error: error.clone(),
                };
                Err(error)
            }
        }
    }

    /// Chunk every document with the session's chunker, in corpus order.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.settings.chunker.chunks(&doc.id, &doc.text))
            .collect()
    }

    /// Top `k` chunks for `query`. Empty when no index is ready.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let Some(index) = self.index() else {
            return Ok(Vec::new());
        };
        let embedder = self.embedder.as_ref();
        self.settings
            .retry
            .run("query embedding", || index.query(embedder, query, k))
            .await
    }

    /// Answer `prompt` in one piece.
    pub async fn ask(&mut self, prompt: &str) -> Result<TurnOutcome> {
        let (payload, sources) = self.prepare_turn(prompt).await?;
        let generator = self.generator.as_ref();
        let generation = self
            .settings
            .retry
            .run("generation", || generator.generate(&payload))
            .await?;
        Ok(self.finish_turn(generation, &payload, sources))
    }

    /// Answer `prompt`, passing text fragments to `on_text` as they arrive.
    ///
    /// Opening the stream is retried once on a retryable error. A failure
    /// after fragments were delivered is returned without retrying.
    pub async fn ask_streaming<F>(&mut self, prompt: &str, on_text: F) -> Result<TurnOutcome>
    where
        F: FnMut(&str) + Send,
    {
        let (payload, sources) = self.prepare_turn(prompt).await?;
        let generator = self.generator.as_ref();
        let stream = self
            .settings
            .retry
            .run("generation stream", || generator.generate_stream(&payload))
            .await?;
        let generation = collect_stream(stream, on_text).await?;
        Ok(self.finish_turn(generation, &payload, sources))
    }

    async fn prepare_turn(&mut self, prompt: &str) -> Result<(PromptPayload, Vec<ScoredChunk>)> {
        self.conversation.append_turn(Role::User, prompt);

        let mut sources = self.search(prompt, self.settings.k).await?;
        let chunks: Vec<Chunk> = sources.iter().map(|s| s.chunk.clone()).collect();
        let payload = build_prompt(
            &self.syllabus.instruction,
            &chunks,
            &self.conversation,
            self.settings.max_context_chars,
        )?;
        sources.truncate(payload.context_chunks);

        debug!(
            history = payload.history.len(),
            context_chunks = payload.context_chunks,
            dropped_chunks = payload.dropped_chunks,
            "prompt assembled"
        );
        Ok((payload, sources))
    }

    fn finish_turn(
        &mut self,
        generation: Generation,
        payload: &PromptPayload,
        sources: Vec<ScoredChunk>,
    ) -> TurnOutcome {
        let cost = generation
            .usage
            .map(|usage| self.usage.record(usage, &self.settings.rates));
        if generation.usage.is_none() {
            warn!("provider reported no token usage; session cost not updated");
        }

        self.conversation
            .append_assistant(generation.text.clone(), generation.usage, cost);

        TurnOutcome {
            text: generation.text,
            usage: generation.usage,
            cost,
            sources,
            dropped_chunks: payload.dropped_chunks,
        }
    }
}
