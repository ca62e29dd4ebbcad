//! Generation provider trait and stream collection.
//!
//! A provider answers a [`PromptPayload`] either in one piece
//! ([`GenerationProvider::generate`]) or as a [`GenerationStream`] of text
//! fragments. Streams are lazy, finite and single-use. Providers may emit
//! several [`StreamEvent::Usage`] snapshots while streaming; only the last
//! one, seen after the stream is exhausted, is reported by
//! [`collect_stream`].

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::Result;
use crate::prompt::PromptPayload;
use crate::usage::TokenUsage;

/// A completed generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    /// Token counts, when the provider reports them.
    pub usage: Option<TokenUsage>,
}

/// One item of a streamed generation.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fragment of generated text.
    Text(String),
    /// A usage snapshot; later snapshots supersede earlier ones.
    Usage(TokenUsage),
}

/// Streamed generation output.
pub type GenerationStream = BoxStream<'static, Result<StreamEvent>>;

/// Trait for text-generation backends.
///
/// Implementations should map provider rate limits to
/// [`Error::RateLimited`](crate::Error::RateLimited) and other failures to
/// [`Error::GenerationService`](crate::Error::GenerationService).
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash-lite"`).
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &PromptPayload) -> Result<Generation>;

    /// Stream the answer. The default runs [`generate`](Self::generate) and
    /// replays the result as a single fragment.
    async fn generate_stream(&self, prompt: &PromptPayload) -> Result<GenerationStream> {
        let generation = self.generate(prompt).await?;
        let mut events = vec![Ok(StreamEvent::Text(generation.text))];
        if let Some(usage) = generation.usage {
            events.push(Ok(StreamEvent::Usage(usage)));
        }
        Ok(stream::iter(events).boxed())
    }
}

/// Drain `stream`, passing each text fragment to `on_text`.
///
/// The first error aborts collection and is returned; partial text is
/// discarded. Usage is taken from the final snapshot only.
pub async fn collect_stream<F>(mut stream: GenerationStream, mut on_text: F) -> Result<Generation>
where
    F: FnMut(&str),
{
    let mut text = String::new();
    let mut usage = None;

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Text(fragment) => {
                on_text(&fragment);
                text.push_str(&fragment);
            }
            StreamEvent::Usage(snapshot) => usage = Some(snapshot),
        }
    }

    Ok(Generation { text, usage })
}
