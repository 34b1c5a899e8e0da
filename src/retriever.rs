//! In-memory passage retriever with keyword, semantic, and hybrid modes.
//!
//! # Hybrid Scoring Algorithm
//!
//! 1. Fetch `candidate_k` keyword candidates (distinct query terms matched).
//! 2. Fetch `candidate_k` vector candidates (cosine similarity).
//! 3. Normalize both sets to `[0, 1]` using min-max normalization.
//! 4. Merge: `score = (1 - α) × keyword + α × semantic`.
//! 5. Sort by score (desc), title (asc), chunk index (asc).
//! 6. Keep at most `max_passages_per_document` passages per title.
//! 7. Truncate to `final_limit`.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::RetrievalConfig;
use crate::embedding::cosine_similarity;
use crate::models::{Passage, RetrievedPassage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Keyword,
    Semantic,
    Hybrid,
}

impl SearchMode {
    fn uses_keywords(self) -> bool {
        matches!(self, SearchMode::Keyword | SearchMode::Hybrid)
    }

    fn uses_vectors(self) -> bool {
        matches!(self, SearchMode::Semantic | SearchMode::Hybrid)
    }
}

/// Retrieval tuning parameters.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub hybrid_alpha: f64,
    pub candidate_k: usize,
    pub final_limit: usize,
    pub max_passages_per_document: usize,
}

impl From<&RetrievalConfig> for SearchParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            hybrid_alpha: config.hybrid_alpha,
            candidate_k: config.candidate_k,
            final_limit: config.final_limit,
            max_passages_per_document: config.max_passages_per_document,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    index: usize,
    raw_score: f64,
}

/// Passages plus (optionally) one embedding vector per passage.
#[derive(Debug, Clone)]
pub struct RetrieverIndex {
    passages: Vec<Passage>,
    vectors: Option<Vec<Vec<f32>>>,
    terms: Vec<HashSet<String>>,
}

impl RetrieverIndex {
    pub fn new(passages: Vec<Passage>, vectors: Option<Vec<Vec<f32>>>) -> Result<Self> {
        if let Some(v) = &vectors {
            if v.len() != passages.len() {
                bail!(
                    "vector count ({}) does not match passage count ({})",
                    v.len(),
                    passages.len()
                );
            }
        }
        let terms = passages.iter().map(|p| tokenize(&p.text)).collect();
        Ok(Self {
            passages,
            vectors,
            terms,
        })
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn vectors(&self) -> Option<&[Vec<f32>]> {
        self.vectors.as_deref()
    }

    pub fn has_vectors(&self) -> bool {
        self.vectors.is_some()
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Number of distinct titles represented in the index.
    pub fn document_count(&self) -> usize {
        self.passages
            .iter()
            .map(|p| p.title.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn search(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        mode: SearchMode,
        params: &SearchParams,
    ) -> Result<Vec<RetrievedPassage>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let keyword = if mode.uses_keywords() {
            self.keyword_candidates(query, params.candidate_k)
        } else {
            Vec::new()
        };

        let vector = if mode.uses_vectors() {
            match query_vec {
                Some(qv) => self.vector_candidates(qv, params.candidate_k)?,
                None => bail!("query vector is required for semantic/hybrid mode"),
            }
        } else {
            Vec::new()
        };

        if keyword.is_empty() && vector.is_empty() {
            return Ok(Vec::new());
        }

        let kw_map: HashMap<usize, f64> = keyword
            .iter()
            .zip(normalize_scores(&raw_scores(&keyword)))
            .map(|(c, s)| (c.index, s))
            .collect();
        let vec_map: HashMap<usize, f64> = vector
            .iter()
            .zip(normalize_scores(&raw_scores(&vector)))
            .map(|(c, s)| (c.index, s))
            .collect();

        let alpha = match mode {
            SearchMode::Keyword => 0.0,
            SearchMode::Semantic => 1.0,
            SearchMode::Hybrid => params.hybrid_alpha,
        };

        let mut indices: Vec<usize> = kw_map.keys().chain(vec_map.keys()).copied().collect();
        indices.sort_unstable();
        indices.dedup();

        let mut scored: Vec<(usize, f64)> = indices
            .into_iter()
            .map(|i| {
                let k = kw_map.get(&i).copied().unwrap_or(0.0);
                let v = vec_map.get(&i).copied().unwrap_or(0.0);
                (i, (1.0 - alpha) * k + alpha * v)
            })
            .collect();

        scored.sort_by(|(ia, sa), (ib, sb)| {
            let (a, b) = (&self.passages[*ia], &self.passages[*ib]);
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });

        let mut per_doc: HashMap<&str, usize> = HashMap::new();
        let mut results = Vec::new();
        for (i, score) in scored {
            let passage = &self.passages[i];
            let count = per_doc.entry(passage.title.as_str()).or_insert(0);
            if *count >= params.max_passages_per_document.max(1) {
                continue;
            }
            *count += 1;
            results.push(RetrievedPassage {
                id: passage.id.clone(),
                title: passage.title.clone(),
                chunk_index: passage.chunk_index,
                score,
                text: passage.text.clone(),
            });
            if results.len() >= params.final_limit {
                break;
            }
        }

        Ok(results)
    }

    fn keyword_candidates(&self, query: &str, limit: usize) -> Vec<Candidate> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut candidates: Vec<Candidate> = self
            .terms
            .iter()
            .enumerate()
            .filter_map(|(index, terms)| {
                let matches = query_terms.iter().filter(|t| terms.contains(*t)).count();
                (matches > 0).then_some(Candidate {
                    index,
                    raw_score: matches as f64,
                })
            })
            .collect();

        sort_candidates(&mut candidates);
        candidates.truncate(limit);
        candidates
    }

    fn vector_candidates(&self, query_vec: &[f32], limit: usize) -> Result<Vec<Candidate>> {
        let vectors = match &self.vectors {
            Some(v) => v,
            None => bail!("index was built without embeddings; use keyword mode"),
        };

        let mut candidates: Vec<Candidate> = vectors
            .iter()
            .enumerate()
            .map(|(index, v)| Candidate {
                index,
                raw_score: cosine_similarity(query_vec, v) as f64,
            })
            .collect();

        sort_candidates(&mut candidates);
        candidates.truncate(limit);
        Ok(candidates)
    }
}

fn sort_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.index.cmp(&b.index))
    });
}

fn raw_scores(candidates: &[Candidate]) -> Vec<f64> {
    candidates.iter().map(|c| c.raw_score).collect()
}

/// Lowercased alphanumeric terms.
fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they are normalized to `1.0`.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    scores
        .iter()
        .map(|s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}
