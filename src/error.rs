//! Error types for collection and model construction.

use thiserror::Error;

use crate::retriever::SearchMode;

/// Failures talking to the remote catalog.
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
    #[error("Fetching '{title}' failed under the abort policy: {source}")]
    Aborted {
        title: String,
        #[source]
        source: Box<CollectError>,
    },
}

impl CollectError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CollectError::Http { .. } => true,
            CollectError::Status { status, .. } => *status == 429 || *status >= 500,
            CollectError::Decode { .. } | CollectError::Aborted { .. } => false,
        }
    }
}

/// Failures while loading models or binding the retriever to a dataset.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),
    #[error("Embedding failed: {0}")]
    Embedding(#[source] anyhow::Error),
    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

/// Caller mistakes when querying a built chatbot.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0:?} search requires an embedding provider; configure [embedding] or use --mode keyword")]
    EmbeddingsRequired(SearchMode),
}
