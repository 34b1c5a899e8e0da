//! Question answering over a built retriever index.
//!
//! [`RagChatbot::ask`] embeds the question (when an encoder is loaded),
//! retrieves passages, renders a grounded prompt and hands it to the
//! generator. The chatbot is immutable once built and is shared across
//! server requests behind an `Arc`.

use anyhow::Result;
use std::sync::Arc;

use crate::builder::LoadedModels;
use crate::config::Config;
use crate::embedding::{embed_query, Embedder};
use crate::error::QueryError;
use crate::generator::{GenerationRequest, Generator};
use crate::models::{Answer, RetrievedPassage};
use crate::retriever::{RetrieverIndex, SearchMode, SearchParams};

pub struct RagChatbot {
    index: RetrieverIndex,
    embedder: Option<Arc<dyn Embedder>>,
    generator: Arc<dyn Generator>,
    params: SearchParams,
    max_context_chars: usize,
}

impl RagChatbot {
    pub fn new(index: RetrieverIndex, models: LoadedModels, config: &Config) -> Self {
        Self {
            index,
            embedder: models.embedder,
            generator: models.generator,
            params: SearchParams::from(&config.retrieval),
            max_context_chars: config.generation.max_context_chars,
        }
    }

    pub fn index(&self) -> &RetrieverIndex {
        &self.index
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedder.as_ref().map(|e| e.model_name())
    }

    pub fn generator_name(&self) -> &str {
        self.generator.model_name()
    }

    /// Hybrid when passages carry vectors and an encoder is loaded, else keyword.
    pub fn default_mode(&self) -> SearchMode {
        if self.embedder.is_some() && self.index.has_vectors() {
            SearchMode::Hybrid
        } else {
            SearchMode::Keyword
        }
    }

    /// Retrieval only. `mode` and `limit` override the configured defaults.
    pub async fn search(
        &self,
        query: &str,
        mode: Option<SearchMode>,
        limit: Option<usize>,
    ) -> Result<Vec<RetrievedPassage>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mode = mode.unwrap_or_else(|| self.default_mode());

        let query_vec = match mode {
            SearchMode::Keyword => None,
            SearchMode::Semantic | SearchMode::Hybrid => {
                let Some(embedder) = &self.embedder else {
                    return Err(QueryError::EmbeddingsRequired(mode).into());
                };
                Some(embed_query(embedder.as_ref(), query).await?)
            }
        };

        let mut params = self.params.clone();
        if let Some(limit) = limit {
            params.final_limit = limit.max(1);
        }

        self.index
            .search(query, query_vec.as_deref(), mode, &params)
    }

    /// Answer `question` from the retrieved passages.
    pub async fn ask(
        &self,
        question: &str,
        mode: Option<SearchMode>,
        limit: Option<usize>,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QueryError::Empty("question").into());
        }

        let passages = self.search(question, mode, limit).await?;
        tracing::debug!(question, passages = passages.len(), "retrieved context");

        let prompt = build_prompt(question, &passages, self.max_context_chars);
        let text = self
            .generator
            .generate(&GenerationRequest {
                question,
                passages: &passages,
                prompt: &prompt,
            })
            .await?;

        Ok(Answer { text, passages })
    }
}

/// Render numbered context passages followed by the question. Passages are
/// added in rank order until `max_chars` of passage text would be exceeded;
/// the first passage is always included, truncated if necessary, so the
/// prompt only claims nothing was found when `passages` is empty.
pub fn build_prompt(question: &str, passages: &[RetrievedPassage], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0usize;

    for (i, passage) in passages.iter().enumerate() {
        let remaining = max_chars.saturating_sub(used);
        if remaining == 0 && i > 0 {
            break;
        }
        let text = if passage.text.len() > remaining {
            if i > 0 {
                break;
            }
            truncate_at_char_boundary(&passage.text, remaining)
        } else {
            passage.text.as_str()
        };
        used += text.len();
        context.push_str(&format!("[{}] {}\n{}\n\n", i + 1, passage.title, text));
    }

    if passages.is_empty() {
        context.push_str("(no passages found)\n\n");
    }

    format!(
        "Context passages:\n\n{}Question: {}\nAnswer:",
        context, question
    )
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
