//! JSON persistence for a built retriever index.
//!
//! A snapshot lets `ask`, `search` and `serve` start without re-downloading
//! the catalog. Vectors are only valid for the encoder that produced them,
//! so restoring a snapshot under a different `embedding.model` is refused.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::builder::LoadedModels;
use crate::chatbot::RagChatbot;
use crate::config::Config;
use crate::error::BuildError;
use crate::models::Passage;
use crate::retriever::RetrieverIndex;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub built_at: DateTime<Utc>,
    pub embedding_model: Option<String>,
    pub dims: Option<usize>,
    pub passages: Vec<Passage>,
    #[serde(default)]
    pub vectors: Option<Vec<Vec<f32>>>,
}

impl Snapshot {
    pub fn from_chatbot(chatbot: &RagChatbot) -> Self {
        Self::from_index(chatbot.index(), chatbot.embedding_model())
    }

    pub fn from_index(index: &RetrieverIndex, embedding_model: Option<&str>) -> Self {
        let vectors = index.vectors().map(<[Vec<f32>]>::to_vec);
        Self {
            version: SNAPSHOT_VERSION,
            built_at: Utc::now(),
            embedding_model: embedding_model.map(str::to_string),
            dims: vectors
                .as_ref()
                .and_then(|v| v.first())
                .map(Vec::len),
            passages: index.passages().to_vec(),
            vectors,
        }
    }

    /// Write pretty JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                BuildError::Snapshot(format!("creating {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| BuildError::Snapshot(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| BuildError::Snapshot(format!("writing {}: {}", path.display(), e)))?;
        tracing::info!(path = %path.display(), passages = self.passages.len(), "snapshot saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BuildError::Snapshot(format!("reading {}: {}", path.display(), e)))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .map_err(|e| BuildError::Snapshot(format!("parsing {}: {}", path.display(), e)))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), BuildError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(BuildError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                self.version, SNAPSHOT_VERSION
            )));
        }
        if let Some(vectors) = &self.vectors {
            if vectors.len() != self.passages.len() {
                return Err(BuildError::Snapshot(format!(
                    "snapshot has {} vectors for {} passages",
                    vectors.len(),
                    self.passages.len()
                )));
            }
            if let Some(dims) = self.dims {
                if vectors.iter().any(|v| v.len() != dims) {
                    return Err(BuildError::Snapshot(format!(
                        "snapshot vectors do not all have {} dimensions",
                        dims
                    )));
                }
            }
        }
        Ok(())
    }

    /// Rebind the stored index to freshly loaded models.
    pub fn into_chatbot(self, models: LoadedModels, config: &Config) -> Result<RagChatbot, BuildError> {
        let configured = models.embedder.as_ref().map(|e| e.model_name().to_string());
        if configured != self.embedding_model {
            return Err(BuildError::Snapshot(format!(
                "snapshot was built with embedding model {} but {} is configured; rebuild the index",
                describe(self.embedding_model.as_deref()),
                describe(configured.as_deref()),
            )));
        }
        if let (Some(embedder), Some(dims)) = (&models.embedder, self.dims) {
            if embedder.dims() != dims {
                return Err(BuildError::Snapshot(format!(
                    "snapshot vectors have {} dimensions but '{}' produces {}; rebuild the index",
                    dims,
                    embedder.model_name(),
                    embedder.dims()
                )));
            }
        }

        let index = RetrieverIndex::new(self.passages, self.vectors)
            .map_err(|e| BuildError::Snapshot(e.to_string()))?;
        Ok(RagChatbot::new(index, models, config))
    }
}

fn describe(model: Option<&str>) -> String {
    match model {
        Some(m) => format!("'{}'", m),
        None => "none".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ChatbotBuilder;
    use crate::embedding::Embedder;
    use crate::generator::ExtractiveGenerator;
    use crate::models::Corpus;
    use crate::testing::HashEmbedder;
    use std::sync::Arc;

    fn models(with_embedder: bool) -> LoadedModels {
        LoadedModels {
            embedder: with_embedder.then(|| Arc::new(HashEmbedder::new(8)) as Arc<dyn Embedder>),
            generator: Arc::new(ExtractiveGenerator::default()),
        }
    }

    async fn built(with_embedder: bool) -> RagChatbot {
        let mut corpus = Corpus::new();
        corpus.insert("Genesis", "In the beginning");
        corpus.insert("Psalms", "The Lord is my shepherd");
        let builder = ChatbotBuilder::new(&Config::minimal());
        let dataset = builder.create_dataset(&corpus);
        builder.build_with(&dataset, models(with_embedder)).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/index.json");

        let bot = built(true).await;
        Snapshot::from_chatbot(&bot).save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded.embedding_model.as_deref(), Some("hash-test"));
        assert_eq!(loaded.dims, Some(8));
        assert_eq!(loaded.passages, bot.index().passages());

        let restored = loaded.into_chatbot(models(true), &Config::minimal()).unwrap();
        assert_eq!(restored.index().len(), 2);
        assert!(restored.index().has_vectors());
    }

    #[tokio::test]
    async fn test_restored_chatbot_answers_the_same() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let bot = built(true).await;
        Snapshot::from_chatbot(&bot).save(&path).unwrap();
        let restored = Snapshot::load(&path)
            .unwrap()
            .into_chatbot(models(true), &Config::minimal())
            .unwrap();

        let before = bot.ask("my shepherd", None, None).await.unwrap();
        let after = restored.ask("my shepherd", None, None).await.unwrap();
        assert_eq!(before.text, after.text);
        assert_eq!(after.passages[0].title, "Psalms");
    }

    #[tokio::test]
    async fn test_model_mismatch_rejected() {
        let snapshot = Snapshot::from_chatbot(&built(true).await);
        let err = snapshot
            .into_chatbot(models(false), &Config::minimal())
            .err()
            .unwrap();
        assert!(err.to_string().contains("hash-test"));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let snapshot = Snapshot::from_chatbot(&built(true).await);
        assert_eq!(snapshot.dims, Some(8));
        let wider = LoadedModels {
            embedder: Some(Arc::new(HashEmbedder::new(16))),
            generator: Arc::new(ExtractiveGenerator::default()),
        };
        let err = snapshot
            .into_chatbot(wider, &Config::minimal())
            .err()
            .unwrap();
        assert!(err.to_string().contains("8 dimensions"));
    }

    #[tokio::test]
    async fn test_rejects_wrong_version_and_vector_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");

        let mut snapshot = Snapshot::from_chatbot(&built(true).await);
        snapshot.version = 99;
        snapshot.save(&path).unwrap();
        assert!(Snapshot::load(&path).is_err());

        snapshot.version = SNAPSHOT_VERSION;
        if let Some(v) = snapshot.vectors.as_mut() {
            v.pop();
        }
        snapshot.save(&path).unwrap();
        assert!(Snapshot::load(&path).is_err());
    }
}
