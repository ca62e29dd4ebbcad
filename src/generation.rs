//! Gemini generation adapter.
//!
//! Implements the core
//! [`GenerationProvider`](course_assistant_core::generation::GenerationProvider)
//! trait against the Gemini REST API:
//!
//! - `POST {base}/v1beta/models/{model}:generateContent` for one-shot answers
//! - `POST {base}/v1beta/models/{model}:streamGenerateContent?alt=sse` for
//!   streamed answers, decoded from server-sent events
//!
//! The system instruction travels in `systemInstruction`; history and the
//! new user message go in `contents`. Token counts come from
//! `usageMetadata.promptTokenCount` and `usageMetadata.candidatesTokenCount`.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use course_assistant_core::conversation::EXTERNAL_USER_ROLE;
use course_assistant_core::generation::{
    Generation, GenerationProvider, GenerationStream, StreamEvent,
};
use course_assistant_core::prompt::PromptPayload;
use course_assistant_core::usage::TokenUsage;
use course_assistant_core::{Error, Service};
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::GenerationConfig;
use crate::http;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

type CoreResult<T> = course_assistant_core::Result<T>;

pub struct GeminiGenerator {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> CoreResult<Self> {
        Ok(Self {
            client: http::client(Service::Generation, config.timeout_secs)?,
            base_url: config
                .url
                .as_deref()
                .unwrap_or(GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: http::api_key(Service::Generation, &config.api_key_env)?,
            model: config.model.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }

    async fn send(&self, url: String, prompt: &PromptPayload) -> CoreResult<reqwest::Response> {
        let body = request_body(prompt);
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key);
        http::post_json(Service::Generation, "Gemini", request, &body).await
    }
}

#[async_trait]
impl GenerationProvider for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &PromptPayload) -> CoreResult<Generation> {
        debug!(
            model = %self.model,
            history = prompt.history.len(),
            context_chunks = prompt.context_chunks,
            "gemini generate request"
        );
        let response = self.send(self.endpoint("generateContent"), prompt).await?;
        let json: Value = response
            .json()
            .await
            .map_err(|e| Error::GenerationService(format!("invalid JSON response: {e}")))?;
        parse_response(&json)
    }

    async fn generate_stream(&self, prompt: &PromptPayload) -> CoreResult<GenerationStream> {
        debug!(model = %self.model, history = prompt.history.len(), "gemini stream request");
        let response = self
            .send(self.endpoint("streamGenerateContent?alt=sse"), prompt)
            .await?;
        Ok(sse_events(response.bytes_stream()).boxed())
    }
}

/// Build the `generateContent` request body.
fn request_body(prompt: &PromptPayload) -> Value {
    let mut contents: Vec<Value> = prompt
        .history
        .iter()
        .map(|message| {
            let parts: Vec<Value> = message.parts.iter().map(|p| json!({ "text": p })).collect();
            json!({ "role": message.role, "parts": parts })
        })
        .collect();
    contents.push(json!({
        "role": EXTERNAL_USER_ROLE,
        "parts": [{ "text": prompt.message }],
    }));

    let mut body = json!({ "contents": contents });
    if !prompt.system_instruction.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": prompt.system_instruction }] });
    }
    body
}

/// Parse a complete (non-streamed) response.
fn parse_response(json: &Value) -> CoreResult<Generation> {
    check_error_payload(json)?;
    if json.get("candidates").is_none() {
        return Err(Error::GenerationService(
            "invalid Gemini response: missing candidates".to_string(),
        ));
    }
    Ok(Generation {
        text: candidate_text(json),
        usage: usage_metadata(json),
    })
}

/// Events carried by one streamed response chunk.
fn parse_stream_chunk(json: &Value) -> CoreResult<Vec<StreamEvent>> {
    check_error_payload(json)?;
    let mut events = Vec::new();
    let text = candidate_text(json);
    if !text.is_empty() {
        events.push(StreamEvent::Text(text));
    }
    if let Some(usage) = usage_metadata(json) {
        events.push(StreamEvent::Usage(usage));
    }
    Ok(events)
}

/// Concatenated text parts of the first candidate.
fn candidate_text(json: &Value) -> String {
    json.pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Token usage, if `usageMetadata.promptTokenCount` is present.
fn usage_metadata(json: &Value) -> Option<TokenUsage> {
    let meta = json.get("usageMetadata")?;
    let input = meta.get("promptTokenCount")?.as_u64()?;
    let output = meta
        .get("candidatesTokenCount")
        .and_then(|c| c.as_u64())
        .unwrap_or(0);
    Some(TokenUsage::new(input, output))
}

/// Map an in-band `{"error": {...}}` payload to an error.
fn check_error_payload(json: &Value) -> CoreResult<()> {
    let Some(error) = json.get("error") else {
        return Ok(());
    };
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown error")
        .to_string();
    let code = error.get("code").and_then(|c| c.as_u64());
    let status = error.get("status").and_then(|s| s.as_str());
    if code == Some(429) || status == Some("RESOURCE_EXHAUSTED") {
        Err(Error::RateLimited {
            service: Service::Generation,
            message,
        })
    } else {
        Err(Error::GenerationService(message))
    }
}

// ============ Server-sent events ============

/// Incremental decoder for `data:` lines of a server-sent event stream.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence, so
/// input is buffered until a full line is available.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed bytes, returning the payloads of every event completed by them.
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(payload) = self.line(line.trim_end_matches(|c| c == '\n' || c == '\r')) {
                events.push(payload);
            }
        }
        events
    }

    /// Flush a trailing event that was not followed by a blank line.
    fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(payload) = self.line(line.trim_end_matches('\r')) {
                return Some(payload);
            }
        }
        self.dispatch()
    }

    fn line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        // comments (":") and other fields are ignored
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        Some(payload)
    }
}

struct SseState<S> {
    body: S,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

impl<S> SseState<S> {
    fn queue(&mut self, payload: &str) -> CoreResult<()> {
        if payload.trim() == "[DONE]" {
            return Ok(());
        }
        let json: Value = serde_json::from_str(payload).map_err(|e| {
            Error::GenerationService(format!("invalid Gemini stream chunk: {e}"))
        })?;
        self.pending.extend(parse_stream_chunk(&json)?);
        Ok(())
    }
}

/// Turn a response body into a lazy stream of [`StreamEvent`]s.
fn sse_events<S, B>(body: S) -> impl Stream<Item = CoreResult<StreamEvent>> + Send + 'static
where
    S: Stream<Item = reqwest::Result<B>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        body,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::try_unfold(state, next_event)
}

async fn next_event<S, B>(mut state: SseState<S>) -> CoreResult<Option<(StreamEvent, SseState<S>)>>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    loop {
        if let Some(event) = state.pending.pop_front() {
            return Ok(Some((event, state)));
        }
        if state.done {
            return Ok(None);
        }
        match state.body.next().await {
            Some(Ok(bytes)) => {
                for payload in state.decoder.push(bytes.as_ref()) {
                    state.queue(&payload)?;
                }
            }
            Some(Err(e)) => return Err(http::transport_error(Service::Generation, "Gemini", e)),
            None => {
                state.done = true;
                if let Some(payload) = state.decoder.finish() {
                    state.queue(&payload)?;
                }
            }
        }
    }
}

/// Create the generation provider named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
