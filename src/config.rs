//! TOML configuration.
//!
//! Every section is optional and falls back to the defaults below, so an
//! empty file is a valid configuration (with embeddings disabled).
//!
//! ```toml
//! [assistant]
//! syllabus_path = "syllabus.txt"
//!
//! [corpus]
//! root = "./course-docs"
//!
//! [chunking]
//! size = 1000
//! overlap = 100
//!
//! [retrieval]
//! k = 3
//! max_context_chars = 8000
//!
//! [embedding]
//! provider = "gemini"
//! model = "text-embedding-004"
//! dims = 768
//!
//! [generation]
//! model = "gemini-2.5-flash-lite"
//!
//! [pricing]
//! input_per_million = 0.10
//! output_per_million = 0.40
//! ```
//!
//! [`load_config`] validates the values and reports problems as
//! [`Error::InvalidConfiguration`] before any provider is contacted.

use anyhow::{Context, Result};
use course_assistant_core::chunk::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use course_assistant_core::index::DEFAULT_BATCH_SIZE;
use course_assistant_core::prompt::DEFAULT_MAX_CONTEXT_CHARS;
use course_assistant_core::usage::{TokenRates, DEFAULT_INPUT_PER_MILLION, DEFAULT_OUTPUT_PER_MILLION};
use course_assistant_core::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    #[serde(default = "default_syllabus_path")]
    pub syllabus_path: PathBuf,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            syllabus_path: default_syllabus_path(),
        }
    }
}

fn default_syllabus_path() -> PathBuf {
    PathBuf::from("syllabus.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// Directory of course documents. No root means no retrieval.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            root: None,
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.pdf".to_string(),
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl ChunkingConfig {
    pub fn chunker(&self) -> course_assistant_core::Result<Chunker> {
        Chunker::new(self.size, self.overlap)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            max_context_chars: default_max_context_chars(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_k() -> usize {
    3
}
fn default_max_context_chars() -> usize {
    DEFAULT_MAX_CONTEXT_CHARS
}
fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama host, proxy, or test server).
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: None,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            url: None,
            api_key_env: default_generation_api_key_env(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_generation_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    #[serde(default = "default_input_per_million")]
    pub input_per_million: f64,
    #[serde(default = "default_output_per_million")]
    pub output_per_million: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_million: DEFAULT_INPUT_PER_MILLION,
            output_per_million: DEFAULT_OUTPUT_PER_MILLION,
        }
    }
}

fn default_input_per_million() -> f64 {
    DEFAULT_INPUT_PER_MILLION
}
fn default_output_per_million() -> f64 {
    DEFAULT_OUTPUT_PER_MILLION
}

impl PricingConfig {
    pub fn rates(&self) -> TokenRates {
        TokenRates {
            input_per_million: self.input_per_million,
            output_per_million: self.output_per_million,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    /// Wait before the single retry of a rate-limited call.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    /// Wait before the single retry of a transport failure.
    #[serde(default = "default_transport_delay_ms")]
    pub transport_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            transport_delay_ms: default_transport_delay_ms(),
        }
    }
}

fn default_rate_limit_delay_ms() -> u64 {
    2000
}
fn default_transport_delay_ms() -> u64 {
    500
}

/// Upper bound for either retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

impl Config {
    /// Check value ranges and provider names.
    pub fn validate(&self) -> course_assistant_core::Result<()> {
        self.chunking.chunker()?;

        if self.retrieval.k == 0 {
            return Err(invalid("retrieval.k must be >= 1"));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(invalid("retrieval.max_context_chars must be > 0"));
        }
        if self.retrieval.batch_size == 0 {
            return Err(invalid("retrieval.batch_size must be > 0"));
        }

        for (name, rate) in [
            ("pricing.input_per_million", self.pricing.input_per_million),
            ("pricing.output_per_million", self.pricing.output_per_million),
        ] {
            if !rate.is_finite() || rate < 0.0 {
                return Err(invalid(&format!("{name} must be a non-negative number")));
            }
        }

        for (name, ms) in [
            ("retry.rate_limit_delay_ms", self.retry.rate_limit_delay_ms),
            ("retry.transport_delay_ms", self.retry.transport_delay_ms),
        ] {
            if Duration::from_millis(ms) > MAX_RETRY_DELAY {
                return Err(invalid(&format!(
                    "{name} must be at most {} ms",
                    MAX_RETRY_DELAY.as_millis()
                )));
            }
        }

        match self.embedding.provider.as_str() {
            "disabled" | "gemini" | "openai" | "ollama" => {}
            other => {
                return Err(invalid(&format!(
                    "unknown embedding provider '{other}'; must be disabled, gemini, openai, or ollama"
                )))
            }
        }
        if self.embedding.dims == Some(0) {
            return Err(invalid("embedding.dims must be > 0"));
        }

        match self.generation.provider.as_str() {
            "gemini" => {}
            other => {
                return Err(invalid(&format!(
                    "unknown generation provider '{other}'; must be gemini"
                )))
            }
        }
        if self.generation.model.trim().is_empty() {
            return Err(invalid("generation.model must not be empty"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfiguration(message.to_string())
}

/// Read, parse, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_error(toml: &str) -> Error {
        parse_config(toml)
            .unwrap_err()
            .downcast::<Error>()
            .expect("expected a core configuration error")
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.size, 1000);
        assert_eq!(config.chunking.overlap, 100);
        assert_eq!(config.retrieval.k, 3);
        assert_eq!(config.generation.model, "gemini-2.5-flash-lite");
        assert_eq!(config.generation.api_key_env, "GEMINI_API_KEY");
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.pricing.rates(), TokenRates::default());
        assert!(config.corpus.root.is_none());
    }

    #[test]
    fn test_full_file_parses() {
        let config = parse_config(
            r#"
[assistant]
syllabus_path = "course/syllabus.txt"

[corpus]
root = "course/docs"
include_globs = ["**/*.pdf"]

[chunking]
size = 500
overlap = 50

[retrieval]
k = 5
max_context_chars = 4000

[embedding]
provider = "ollama"
model = "nomic-embed-text"
dims = 768
url = "http://localhost:11434"

[pricing]
input_per_million = 0.30
output_per_million = 2.50

[retry]
rate_limit_delay_ms = 10
"#,
        )
        .unwrap();
        assert_eq!(config.corpus.root, Some(PathBuf::from("course/docs")));
        assert_eq!(config.corpus.include_globs, vec!["**/*.pdf"]);
        assert_eq!(config.chunking.chunker().unwrap().step(), 450);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.pricing.input_per_million, 0.30);
        assert_eq!(config.retry.rate_limit_delay_ms, 10);
        assert_eq!(config.retry.transport_delay_ms, 500);
    }

    #[test]
    fn test_overlap_not_smaller_than_size_rejected() {
        let err = config_error("[chunking]\nsize = 100\noverlap = 100\n");
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn test_zero_k_rejected() {
        assert!(matches!(
            config_error("[retrieval]\nk = 0\n"),
            Error::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_negative_rate_rejected() {
        assert!(matches!(
            config_error("[pricing]\ninput_per_million = -1.0\n"),
            Error::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_unknown_providers_rejected() {
        assert!(matches!(
            config_error("[embedding]\nprovider = \"magic\"\n"),
            Error::InvalidConfiguration(_)
        ));
        assert!(matches!(
            config_error("[generation]\nprovider = \"magic\"\n"),
            Error::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_excessive_retry_delay_rejected() {
        assert!(matches!(
            config_error("[retry]\nrate_limit_delay_ms = 600000\n"),
            Error::InvalidConfiguration(_)
        ));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = parse_config("[chunking\nsize = 1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
