//! Retriever encoder abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete backends:
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **[`LocalEmbedder`]**: runs a model in-process via fastembed (feature
//!   `local-embeddings`); the checkpoint is downloaded from Hugging Face on
//!   first use and cached.
//!
//! `provider = "disabled"` (the default) means no encoder at all: the
//! retriever falls back to keyword scoring.
//!
//! # Retry Strategy
//!
//! The Ollama backend uses exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::BuildError;

/// Encodes texts into fixed-size vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Checkpoint identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality.
    fn dims(&self) -> usize;
    /// Embed a batch; one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let vector = embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("Empty embedding response"))?;
    check_dims(embedder, std::slice::from_ref(&vector))?;
    Ok(vector)
}

/// Every vector must have exactly [`Embedder::dims`] components.
pub fn check_dims(embedder: &dyn Embedder, vectors: &[Vec<f32>]) -> Result<()> {
    let expected = embedder.dims();
    if let Some(v) = vectors.iter().find(|v| v.len() != expected) {
        bail!(
            "{} returned a {}-dimensional vector, expected {}",
            embedder.model_name(),
            v.len(),
            expected
        );
    }
    Ok(())
}

/// Instantiate the configured encoder, or `None` when embeddings are disabled.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Option<Arc<dyn Embedder>>, BuildError> {
    if !config.is_enabled() {
        return Ok(None);
    }
    match config.provider.as_str() {
        "ollama" => Ok(Some(Arc::new(OllamaEmbedder::new(config)?))),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Some(Arc::new(LocalEmbedder::new(config)?))),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(BuildError::ModelLoad(
            "Local embedding provider requires --features local-embeddings".to_string(),
        )),
        other => Err(BuildError::ModelLoad(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

// ============ Ollama ============

/// Encoder backed by `POST {url}/api/embed` on an Ollama instance
/// (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, BuildError> {
        let model = config.model.clone().ok_or_else(|| {
            BuildError::ModelLoad("embedding.model required for Ollama provider".to_string())
        })?;
        let dims = config.dims.ok_or_else(|| {
            BuildError::ModelLoad("embedding.dims required for Ollama provider".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string())
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BuildError::ModelLoad(e.to_string()))?;

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let vectors = parse_ollama_response(&json)?;
                        if vectors.len() != texts.len() {
                            bail!(
                                "Ollama returned {} embeddings for {} inputs",
                                vectors.len(),
                                texts.len()
                            );
                        }
                        return Ok(vectors);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("Ollama API error {}: {}", status, body_text));
                        continue;
                    }
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Ollama embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
                .map(|values| {
                    values
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                        .collect()
                })
        })
        .collect()
}

// ============ Local (fastembed) ============

/// In-process encoder. No network calls after the first model download.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<std::sync::Mutex<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, BuildError> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        let (checkpoint, default_dims) = fastembed_checkpoint(&model_name)?;

        let model = fastembed::TextEmbedding::try_new(
            fastembed::InitOptions::new(checkpoint).with_show_download_progress(true),
        )
        .map_err(|e| {
            BuildError::ModelLoad(format!(
                "Failed to initialize local embedding model '{}': {}",
                model_name, e
            ))
        })?;

        Ok(Self {
            model_name,
            dims: config.dims.unwrap_or(default_dims),
            batch_size: config.batch_size,
            model: Arc::new(std::sync::Mutex::new(model)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
fn fastembed_checkpoint(name: &str) -> Result<(fastembed::EmbeddingModel, usize), BuildError> {
    use fastembed::EmbeddingModel as M;
    match name {
        "all-minilm-l6-v2" => Ok((M::AllMiniLML6V2, 384)),
        "bge-small-en-v1.5" => Ok((M::BGESmallENV15, 384)),
        "bge-base-en-v1.5" => Ok((M::BGEBaseENV15, 768)),
        "bge-large-en-v1.5" => Ok((M::BGELargeENV15, 1024)),
        "nomic-embed-text-v1.5" => Ok((M::NomicEmbedTextV15, 768)),
        other => Err(BuildError::ModelLoad(format!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5",
            other
        ))),
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty or mismatched vectors.
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
