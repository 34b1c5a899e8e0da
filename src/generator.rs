//! Answer generation backends.
//!
//! | Config Value | Generator |
//! |-------------|-----------|
//! | `"extractive"` | [`ExtractiveGenerator`]: no model; answers with the retrieved passages |
//! | `"ollama"` | [`OllamaGenerator`]: `POST {url}/api/generate` |
//! | `"openai"` | [`OpenAiGenerator`]: OpenAI-compatible `POST {url}/v1/chat/completions` |

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::BuildError;
use crate::models::RetrievedPassage;

/// Everything a generator may condition on.
#[derive(Debug, Clone)]
pub struct GenerationRequest<'a> {
    pub question: &'a str,
    pub passages: &'a [RetrievedPassage],
    /// Rendered context and question; system instructions are added by
    /// each backend.
    pub prompt: &'a str,
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>, BuildError> {
    match config.provider.as_str() {
        "extractive" => Ok(Arc::new(ExtractiveGenerator::default())),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAiGenerator::new(config)?)),
        other => Err(BuildError::ModelLoad(format!(
            "Unknown generation provider: {}",
            other
        ))),
    }
}

// ============ Extractive ============

/// Returns the best passages verbatim, each tagged with its title.
pub struct ExtractiveGenerator {
    max_passages: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self { max_passages: 3 }
    }
}

#[async_trait]
impl Generator for ExtractiveGenerator {
    fn model_name(&self) -> &str {
        "extractive"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        if request.passages.is_empty() {
            return Ok(format!(
                "No relevant passages were found for \"{}\".",
                request.question
            ));
        }

        Ok(request
            .passages
            .iter()
            .take(self.max_passages)
            .map(|p| format!("[{}] {}", p.title, p.text))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    url: String,
    temperature: Option<f32>,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, BuildError> {
        let model = config.model.clone().ok_or_else(|| {
            BuildError::ModelLoad("generation.model required for Ollama provider".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            model,
            url,
            temperature: config.temperature,
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "system": SYSTEM_PROMPT,
            "prompt": request.prompt,
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["options"] = json!({ "temperature": t });
        }

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url,
                    e
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, text);
        }

        let payload: Value = response.json().await?;
        payload
            .get("response")
            .and_then(Value::as_str)
            .map(|s| s.trim().to_string())
            .ok_or_else(|| anyhow!("Invalid Ollama response: missing 'response'"))
    }
}

// ============ OpenAI-compatible ============

/// Works against OpenAI or any server exposing `/v1/chat/completions`
/// (LM Studio, vLLM, llama.cpp server). Sends `OPENAI_API_KEY` as a bearer
/// token when it is set.
pub struct OpenAiGenerator {
    model: String,
    url: String,
    temperature: Option<f32>,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self, BuildError> {
        let model = config.model.clone().ok_or_else(|| {
            BuildError::ModelLoad("generation.model required for OpenAI provider".to_string())
        })?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            model,
            url,
            temperature: config.temperature,
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            client: build_client(config)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": request.prompt },
            ],
            "stream": false,
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }

        let mut req = self
            .client
            .post(format!("{}/v1/chat/completions", self.url))
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Chat completion error {}: {}", status, text);
        }

        let payload: Value = response.json().await?;
        parse_chat_completion(&payload)
    }
}

fn parse_chat_completion(payload: &Value) -> Result<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("Invalid chat completion response: missing content"))
}

fn build_client(config: &GenerationConfig) -> Result<reqwest::Client, BuildError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| BuildError::ModelLoad(e.to_string()))
}

pub const SYSTEM_PROMPT: &str = "You answer questions about Jewish texts. \
Use only the provided passages. If they do not contain the answer, say so. \
Cite passage titles in square brackets.";
