//! Core data types that flow through collect → clean → build.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// In-memory mapping from index title to document text.
///
/// Rebuilt on every run; never persisted by the collector itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Corpus {
    texts: BTreeMap<String, String>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: impl Into<String>, text: impl Into<String>) {
        self.texts.insert(title.into(), text.into());
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.texts.get(title).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.texts.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.texts.iter().map(|(t, x)| (t.as_str(), x.as_str()))
    }

    /// Total characters across all texts.
    pub fn total_chars(&self) -> usize {
        self.texts.values().map(|t| t.chars().count()).sum()
    }
}

impl FromIterator<(String, String)> for Corpus {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            texts: iter.into_iter().collect(),
        }
    }
}

/// A retrievable chunk of one dataset row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub title: String,
    pub chunk_index: usize,
    pub text: String,
    pub hash: String,
}

/// A passage returned by the retriever, with its merged relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedPassage {
    pub id: String,
    pub title: String,
    pub chunk_index: usize,
    pub score: f64,
    pub text: String,
}

/// The chatbot's reply to a question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub passages: Vec<RetrievedPassage>,
}
