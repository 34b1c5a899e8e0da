//! Remote text catalog access.
//!
//! Defines the [`CatalogSource`] trait and the HTTP-backed [`SefariaClient`].
//!
//! # Endpoints
//!
//! | Method | Path | Field read |
//! |--------|------|------------|
//! | `GET` | `{base_url}/index` | `title` of each entry (category `contents` walked recursively) |
//! | `GET` | `{base_url}/texts/{title}?context=0` | `text` (string or nested arrays of strings) |
//!
//! # Retry Strategy
//!
//! - Network errors, HTTP 429 and 5xx → retry with exponential backoff
//! - Other 4xx and undecodable bodies → fail immediately
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::CatalogConfig;
use crate::error::CollectError;

/// A source of index titles and their texts.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// List every index title in the catalog, in catalog order.
    async fn list_indices(&self) -> Result<Vec<String>, CollectError>;

    /// Fetch the text for one title. An absent text is `Ok("")`.
    async fn fetch_text(&self, title: &str) -> Result<String, CollectError>;
}

/// HTTP client for the Sefaria REST API (or anything shaped like it).
pub struct SefariaClient {
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
}

impl SefariaClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CollectError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("sefaria-rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| CollectError::Http {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self {
            base_url,
            client,
            max_retries: config.max_retries,
        })
    }

    pub fn index_url(&self) -> String {
        format!("{}/index", self.base_url)
    }

    pub fn text_url(&self, title: &str) -> String {
        format!(
            "{}/texts/{}?context=0",
            self.base_url,
            urlencoding::encode(title)
        )
    }

    async fn get_json(&self, url: &str) -> Result<Value, CollectError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(url, attempt, ?delay, "retrying catalog request");
                tokio::time::sleep(delay).await;
            }

            match self.get_json_once(url).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| CollectError::Decode {
            url: url.to_string(),
            message: "request failed after retries".to_string(),
        }))
    }

    async fn get_json_once(&self, url: &str) -> Result<Value, CollectError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| CollectError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json::<Value>().await.map_err(|e| CollectError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CatalogSource for SefariaClient {
    async fn list_indices(&self) -> Result<Vec<String>, CollectError> {
        let url = self.index_url();
        let value = self.get_json(&url).await?;
        parse_catalog(&url, &value)
    }

    async fn fetch_text(&self, title: &str) -> Result<String, CollectError> {
        let url = self.text_url(title);
        let value = self.get_json(&url).await?;
        parse_text_response(&url, &value)
    }
}

/// Extract index titles from a catalog response.
///
/// The response must be a JSON array. Entries with a `title` string are
/// taken directly; entries with a `contents` array are walked recursively.
/// Duplicates are dropped, keeping the first occurrence.
pub fn parse_catalog(url: &str, value: &Value) -> Result<Vec<String>, CollectError> {
    let entries = value.as_array().ok_or_else(|| CollectError::Decode {
        url: url.to_string(),
        message: "catalog response is not an array".to_string(),
    })?;

    let mut seen = HashSet::new();
    let mut titles = Vec::new();
    collect_titles(entries, &mut seen, &mut titles);
    Ok(titles)
}

fn collect_titles(entries: &[Value], seen: &mut HashSet<String>, out: &mut Vec<String>) {
    for entry in entries {
        if let Some(title) = entry.get("title").and_then(Value::as_str) {
            if !title.is_empty() && seen.insert(title.to_string()) {
                out.push(title.to_string());
            }
        }
        if let Some(children) = entry.get("contents").and_then(Value::as_array) {
            collect_titles(children, seen, out);
        }
    }
}

/// Read the `text` field of a text-endpoint response.
///
/// Sefaria answers unknown titles with `200 {"error": "..."}`; that is
/// reported as a decode error rather than an empty text.
pub fn parse_text_response(url: &str, value: &Value) -> Result<String, CollectError> {
    if value.get("text").is_none() {
        if let Some(message) = value.get("error").and_then(Value::as_str) {
            return Err(CollectError::Decode {
                url: url.to_string(),
                message: message.to_string(),
            });
        }
    }

    Ok(value.get("text").map(flatten_text).unwrap_or_default())
}

/// Flatten a string or nested arrays of strings into one text.
///
/// A plain string is returned unchanged. Inside arrays, blank leaves are
/// dropped and the rest are joined with blank lines so that verse and
/// chapter boundaries become paragraph boundaries.
pub fn flatten_text(value: &Value) -> String {
    if let Value::String(s) = value {
        return s.clone();
    }
    let mut parts = Vec::new();
    push_leaves(value, &mut parts);
    parts.join("\n\n")
}

fn push_leaves<'a>(value: &'a Value, parts: &mut Vec<&'a str>) {
    match value {
        Value::String(s) if !s.trim().is_empty() => parts.push(s),
        Value::Array(items) => {
            for item in items {
                push_leaves(item, parts);
            }
        }
        _ => {}
    }
}
