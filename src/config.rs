//! TOML configuration.
//!
//! Every section is optional: a missing file or a missing section falls
//! back to the defaults below, which point at the public Sefaria API and
//! use keyword-only retrieval with the extractive generator.
//!
//! ```toml
//! [catalog]
//! base_url = "https://www.sefaria.org/api"
//! fetch_policy = "skip"      # or "abort"
//! limit = 50
//!
//! [embedding]
//! provider = "ollama"
//! model = "nomic-embed-text"
//! dims = 768
//!
//! [generation]
//! provider = "ollama"
//! model = "llama3.2"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::collector::FetchPolicy;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub preprocess: PreprocessConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_catalog_retries")]
    pub max_retries: u32,
    /// Pause between consecutive text fetches.
    #[serde(default)]
    pub request_delay_ms: u64,
    #[serde(default)]
    pub fetch_policy: FetchPolicy,
    /// Only fetch the first `limit` titles of the catalog.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_catalog_retries(),
            request_delay_ms: 0,
            fetch_policy: FetchPolicy::default(),
            limit: None,
        }
    }
}

fn default_base_url() -> String {
    "https://www.sefaria.org/api".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_catalog_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PreprocessConfig {
    /// Drop `<...>` markup before filtering characters.
    #[serde(default)]
    pub strip_markup: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    256
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_hybrid_alpha")]
    pub hybrid_alpha: f64,
    #[serde(default = "default_candidate_k")]
    pub candidate_k: usize,
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    #[serde(default = "default_max_passages_per_document")]
    pub max_passages_per_document: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hybrid_alpha: default_hybrid_alpha(),
            candidate_k: default_candidate_k(),
            final_limit: default_final_limit(),
            max_passages_per_document: default_max_passages_per_document(),
        }
    }
}

fn default_hybrid_alpha() -> f64 {
    0.6
}
fn default_candidate_k() -> usize {
    80
}
fn default_final_limit() -> usize {
    5
}
fn default_max_passages_per_document() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout_secs(),
            temperature: None,
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_generation_provider() -> String {
    "extractive".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_max_context_chars() -> usize {
    6000
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// Built-in defaults, used when no configuration file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Load and validate the configuration at `path`.
///
/// A path that does not exist yields [`Config::minimal`]; a file that
/// exists but fails to parse or validate is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::minimal());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.catalog.base_url.trim().is_empty() {
        bail!("catalog.base_url must not be empty");
    }

    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        bail!("retrieval.final_limit must be >= 1");
    }

    if !(0.0..=1.0).contains(&config.retrieval.hybrid_alpha) {
        bail!("retrieval.hybrid_alpha must be in [0.0, 1.0]");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    if config.generation.max_context_chars == 0 {
        bail!("generation.max_context_chars must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "local" => {}
        "ollama" => {
            if config.embedding.model.is_none() {
                bail!("embedding.model must be specified when provider is 'ollama'");
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!("embedding.dims must be > 0 when provider is 'ollama'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, or local.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "extractive" => {}
        "ollama" | "openai" => {
            if config.generation.model.is_none() {
                bail!(
                    "generation.model must be specified when provider is '{}'",
                    config.generation.provider
                );
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be extractive, ollama, or openai.",
            other
        ),
    }

    Ok(())
}
