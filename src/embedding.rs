//! Embedding provider adapters.
//!
//! Concrete implementations of the core
//! [`EmbeddingProvider`](course_assistant_core::embedding::EmbeddingProvider)
//! trait, selected by `embedding.provider`:
//!
//! | Config Value | Provider | Endpoint |
//! |-------------|----------|----------|
//! | `"disabled"` | [`DisabledProvider`] | none |
//! | `"gemini"` | [`GeminiEmbedder`] | `POST /v1beta/models/{model}:batchEmbedContents` |
//! | `"openai"` | [`OpenAIEmbedder`] | `POST /v1/embeddings` |
//! | `"ollama"` | [`OllamaEmbedder`] | `POST /api/embed` |
//!
//! Adapters make a single attempt. HTTP 429 maps to
//! [`Error::RateLimited`]; the session's retry policy decides whether to
//! try again.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use course_assistant_core::embedding::EmbeddingProvider;
use course_assistant_core::{Error, Service};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::http;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const GEMINI_DEFAULT_MODEL: &str = "text-embedding-004";
const GEMINI_DEFAULT_DIMS: usize = 768;

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const OPENAI_DEFAULT_MODEL: &str = "text-embedding-3-small";
const OPENAI_DEFAULT_DIMS: usize = 1536;

const OLLAMA_BASE_URL: &str = "http://localhost:11434";

type CoreResult<T> = course_assistant_core::Result<T>;

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"`. The assistant still answers,
/// just without retrieved course material.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        Err(Error::EmbeddingService(
            "embedding provider is disabled".to_string(),
        ))
    }
}

// ============ Gemini Provider ============

/// Embedding provider using the Gemini `batchEmbedContents` endpoint.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> CoreResult<Self> {
        let api_key_env = config.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY");
        Ok(Self {
            client: http::client(Service::Embedding, config.timeout_secs)?,
            base_url: base_url(config, GEMINI_BASE_URL),
            api_key: http::api_key(Service::Embedding, api_key_env)?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            dims: config.dims.unwrap_or(GEMINI_DEFAULT_DIMS),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let url = format!(
            "{}/v1beta/models/{}:batchEmbedContents",
            self.base_url, self.model
        );
        let model_path = format!("models/{}", self.model);
        let requests: Vec<serde_json::Value> = texts
            .iter()
            .map(|text| {
                serde_json::json!({
                    "model": model_path,
                    "content": { "parts": [{ "text": text }] },
                })
            })
            .collect();
        let body = serde_json::json!({ "requests": requests });

        debug!(model = %self.model, batch = texts.len(), "gemini embed request");
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key);
        let json = read_json(http::post_json(Service::Embedding, "Gemini", request, &body).await?)
            .await?;
        parse_gemini_response(&json)
    }
}

/// Extract `embeddings[].values` in order.
fn parse_gemini_response(json: &serde_json::Value) -> CoreResult<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| invalid_response("Gemini", "missing embeddings array"))?;

    embeddings
        .iter()
        .map(|item| {
            let values = item
                .get("values")
                .and_then(|v| v.as_array())
                .ok_or_else(|| invalid_response("Gemini", "missing values"))?;
            to_f32_vec("Gemini", values)
        })
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with bearer authentication. The key is read
/// from `embedding.api_key_env` (default `OPENAI_API_KEY`).
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> CoreResult<Self> {
        let api_key_env = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        Ok(Self {
            client: http::client(Service::Embedding, config.timeout_secs)?,
            base_url: base_url(config, OPENAI_BASE_URL),
            api_key: http::api_key(Service::Embedding, api_key_env)?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            dims: config.dims.unwrap_or(OPENAI_DEFAULT_DIMS),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        debug!(model = %self.model, batch = texts.len(), "openai embed request");
        let request = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key));
        let json = read_json(http::post_json(Service::Embedding, "OpenAI", request, &body).await?)
            .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> CoreResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| invalid_response("OpenAI", "missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| invalid_response("OpenAI", "missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, to_f32_vec("OpenAI", embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider for a local Ollama server (`POST /api/embed`).
///
/// Needs no API key. `embedding.model` and `embedding.dims` must be set
/// since Ollama models vary.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> CoreResult<Self> {
        let model = config.model.clone().ok_or_else(|| {
            Error::InvalidConfiguration("embedding.model required for Ollama provider".into())
        })?;
        let dims = config.dims.ok_or_else(|| {
            Error::InvalidConfiguration("embedding.dims required for Ollama provider".into())
        })?;
        Ok(Self {
            client: http::client(Service::Embedding, config.timeout_secs)?,
            base_url: base_url(config, OLLAMA_BASE_URL),
            model,
            dims,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        debug!(model = %self.model, batch = texts.len(), "ollama embed request");
        let request = self.client.post(format!("{}/api/embed", self.base_url));
        let json = read_json(http::post_json(Service::Embedding, "Ollama", request, &body).await?)
            .await?;
        parse_ollama_response(&json)
    }
}

/// Extract `embeddings[]` (each a plain array of numbers).
fn parse_ollama_response(json: &serde_json::Value) -> CoreResult<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| invalid_response("Ollama", "missing embeddings array"))?;

    embeddings
        .iter()
        .map(|item| {
            let values = item
                .as_array()
                .ok_or_else(|| invalid_response("Ollama", "embedding is not an array"))?;
            to_f32_vec("Ollama", values)
        })
        .collect()
}

// ============ Helpers ============

fn base_url(config: &EmbeddingConfig, default: &str) -> String {
    config
        .url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}

async fn read_json(response: reqwest::Response) -> CoreResult<serde_json::Value> {
    response
        .json()
        .await
        .map_err(|e| Error::EmbeddingService(format!("invalid JSON response: {e}")))
}

fn to_f32_vec(provider: &str, values: &[serde_json::Value]) -> CoreResult<Vec<f32>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| invalid_response(provider, "non-numeric embedding value"))
        })
        .collect()
}

fn invalid_response(provider: &str, what: &str) -> Error {
    Error::EmbeddingService(format!("invalid {provider} response: {what}"))
}

/// Create the embedding provider named by `config.provider`.
///
/// # Errors
///
/// Returns an error for unknown provider names, a missing API key, or
/// missing model settings.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "disabled" => Arc::new(DisabledProvider),
        "gemini" => Arc::new(GeminiEmbedder::new(config)?),
        "openai" => Arc::new(OpenAIEmbedder::new(config)?),
        "ollama" => Arc::new(OllamaEmbedder::new(config)?),
        other => bail!("Unknown embedding provider: {}", other),
    };
    Ok(provider)
}
