//! Chatbot construction: dataset → models → retriever index.
//!
//! [`ChatbotBuilder::build`] always creates the dataset before it touches
//! any model, so an empty or odd corpus never fails earlier than model
//! loading would. Model and embedding failures are returned as
//! [`BuildError`] and abort the build.

use std::sync::Arc;

use crate::chatbot::RagChatbot;
use crate::config::Config;
use crate::dataset::CorpusDataset;
use crate::embedding::{check_dims, create_embedder, Embedder};
use crate::error::BuildError;
use crate::generator::{create_generator, Generator};
use crate::models::{Corpus, Passage};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::retriever::RetrieverIndex;

/// The retriever encoder (if any) and the generator.
#[derive(Clone)]
pub struct LoadedModels {
    pub embedder: Option<Arc<dyn Embedder>>,
    pub generator: Arc<dyn Generator>,
}

impl LoadedModels {
    /// Instantiate the models named in the configuration.
    pub fn from_config(config: &Config) -> Result<Self, BuildError> {
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        tracing::info!(
            embedding_model = embedder.as_ref().map(|e| e.model_name()).unwrap_or("disabled"),
            generator = generator.model_name(),
            "models loaded"
        );
        Ok(Self {
            embedder,
            generator,
        })
    }
}

pub struct ChatbotBuilder {
    config: Config,
    progress: Box<dyn ProgressReporter>,
}

impl ChatbotBuilder {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn create_dataset(&self, corpus: &Corpus) -> CorpusDataset {
        CorpusDataset::from_corpus(corpus)
    }

    pub fn load_models(&self) -> Result<LoadedModels, BuildError> {
        LoadedModels::from_config(&self.config)
    }

    /// Build a chatbot from a cleaned corpus using the configured models.
    pub async fn build(&self, corpus: &Corpus) -> Result<RagChatbot, BuildError> {
        let dataset = self.create_dataset(corpus);
        tracing::info!(rows = dataset.len(), "dataset created");
        let models = self.load_models()?;
        self.build_with(&dataset, models).await
    }

    /// Bind a retriever over `dataset` using already-loaded models.
    pub async fn build_with(
        &self,
        dataset: &CorpusDataset,
        models: LoadedModels,
    ) -> Result<RagChatbot, BuildError> {
        let passages = dataset.passages(self.config.chunking.max_tokens);
        tracing::info!(
            rows = dataset.len(),
            passages = passages.len(),
            "dataset chunked"
        );

        let vectors = match &models.embedder {
            Some(embedder) => Some(self.embed_passages(embedder.as_ref(), &passages).await?),
            None => None,
        };

        let index = RetrieverIndex::new(passages, vectors)
            .map_err(|e| BuildError::Embedding(e.context("binding retriever index")))?;

        Ok(RagChatbot::new(index, models, &self.config))
    }

    async fn embed_passages(
        &self,
        embedder: &dyn Embedder,
        passages: &[Passage],
    ) -> Result<Vec<Vec<f32>>, BuildError> {
        let total = passages.len() as u64;
        let mut vectors = Vec::with_capacity(passages.len());

        for batch in passages.chunks(self.config.embedding.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let batch_vectors = embedder.embed(&texts).await.map_err(BuildError::Embedding)?;
            if batch_vectors.len() != texts.len() {
                return Err(BuildError::Embedding(anyhow::anyhow!(
                    "embedder returned {} vectors for {} passages",
                    batch_vectors.len(),
                    texts.len()
                )));
            }
            check_dims(embedder, &batch_vectors).map_err(BuildError::Embedding)?;
            vectors.extend(batch_vectors);
            self.progress.report(ProgressEvent::Embedding {
                n: vectors.len() as u64,
                total,
            });
        }

        Ok(vectors)
    }
}
