//! Corpus collection.
//!
//! Lists every title from a [`CatalogSource`] and fetches each text in
//! turn, one request at a time. What happens when a single fetch fails is
//! decided by [`FetchPolicy`]:
//!
//! | Policy | Per-document failure |
//! |--------|----------------------|
//! | `skip` (default) | logged as a warning, title left out of the corpus |
//! | `abort` | collection stops with [`CollectError::Aborted`] |
//!
//! A failure to list the catalog is always returned to the caller.

use serde::Deserialize;
use std::time::Duration;

use crate::catalog::CatalogSource;
use crate::error::CollectError;
use crate::models::Corpus;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPolicy {
    #[default]
    Skip,
    Abort,
}

pub struct DataCollector<S> {
    source: S,
    policy: FetchPolicy,
    limit: Option<usize>,
    request_delay: Duration,
    progress: Box<dyn ProgressReporter>,
}

impl<S: CatalogSource> DataCollector<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            policy: FetchPolicy::Skip,
            limit: None,
            request_delay: Duration::ZERO,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_policy(mut self, policy: FetchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// List all titles in the catalog.
    pub async fn list_indices(&self) -> Result<Vec<String>, CollectError> {
        self.source.list_indices().await
    }

    /// Fetch one text, mapping any failure to an empty string.
    pub async fn fetch_text(&self, title: &str) -> String {
        match self.source.fetch_text(title).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Failed to fetch data for {}: {}", title, e);
                String::new()
            }
        }
    }

    /// Collect every non-empty text in the catalog.
    pub async fn collect_all(&self) -> Result<Corpus, CollectError> {
        self.progress.report(ProgressEvent::Discovering);

        let mut titles = self.list_indices().await?;
        if let Some(limit) = self.limit {
            titles.truncate(limit);
        }
        tracing::info!(titles = titles.len(), "catalog listed");

        let total = titles.len() as u64;
        let mut corpus = Corpus::new();
        let mut empty = 0usize;

        for (i, title) in titles.iter().enumerate() {
            if i > 0 && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }

            let text = match self.policy {
                FetchPolicy::Skip => {
                    let text = self.fetch_text(title).await;
                    if text.is_empty() {
                        empty += 1;
                    }
                    text
                }
                FetchPolicy::Abort => match self.source.fetch_text(title).await {
                    Ok(text) => {
                        if text.is_empty() {
                            empty += 1;
                        }
                        text
                    }
                    Err(e) => {
                        tracing::error!(title = %title, "aborting collection");
                        return Err(CollectError::Aborted {
                            title: title.clone(),
                            source: Box::new(e),
                        });
                    }
                },
            };

            if !text.is_empty() {
                corpus.insert(title.clone(), text);
            }

            self.progress.report(ProgressEvent::Fetching {
                title: title.clone(),
                n: i as u64 + 1,
                total,
            });
        }

        tracing::info!(
            collected = corpus.len(),
            skipped = empty,
            "collection finished"
        );
        Ok(corpus)
    }
}
