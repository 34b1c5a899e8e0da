//! Deterministic model doubles shared by unit tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Mutex;

use crate::embedding::Embedder;
use crate::generator::{GenerationRequest, Generator};

/// Bag-of-words embedder: each lowercase token increments one bucket.
pub struct HashEmbedder {
    dims: usize,
    reported_dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            reported_dims: dims,
        }
    }

    /// Claim `dims` from [`Embedder::dims`] while still producing the real size.
    pub fn reporting_dims(mut self, dims: usize) -> Self {
        self.reported_dims = dims;
        self
    }

    fn bucket(&self, token: &str) -> usize {
        token
            .bytes()
            .fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize))
            % self.dims
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dims(&self) -> usize {
        self.reported_dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; self.dims];
                for token in text.split_whitespace() {
                    v[self.bucket(&token.to_lowercase())] += 1.0;
                }
                v
            })
            .collect())
    }
}

pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }

    fn dims(&self) -> usize {
        4
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("encoder unavailable")
    }
}

/// Records every prompt it receives and answers with a fixed string.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        self.prompts
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .push(request.prompt.to_string());
        Ok(format!("answer from {} passages", request.passages.len()))
    }
}
