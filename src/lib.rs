//! # Sefaria RAG
//!
//! Collect texts from the Sefaria REST catalog, clean them, and answer
//! questions over them with retrieval-augmented generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Collector  │──▶│ Preprocessor│──▶│   Builder    │
//! │ /index /text│   │ [^a-zA-Z0-9]│   │ chunk+embed  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │
//!                        ┌───────────────────┼──────────────┐
//!                        ▼                   ▼              ▼
//!                   ┌──────────┐       ┌──────────┐   ┌──────────┐
//!                   │   CLI    │       │   HTTP   │   │ Snapshot │
//!                   │ask/search│       │  /ask    │   │  (JSON)  │
//!                   └──────────┘       └──────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sefaria-rag collect --limit 20 --output corpus.json
//! sefaria-rag build --limit 20 --output index.json
//! sefaria-rag ask "What was created in the beginning?" --index index.json
//! sefaria-rag serve --index index.json
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`catalog`] | Sefaria REST client |
//! | [`collector`] | Sequential corpus collection |
//! | [`preprocess`] | Character-class text cleaning |
//! | [`dataset`] | Columnar corpus dataset |
//! | [`chunk`] | Passage chunking |
//! | [`embedding`] | Retriever encoder abstraction |
//! | [`generator`] | Answer generation backends |
//! | [`retriever`] | Keyword, semantic, and hybrid retrieval |
//! | [`builder`] | Dataset → models → chatbot |
//! | [`chatbot`] | Question answering |
//! | [`snapshot`] | Index persistence |
//! | [`server`] | JSON HTTP API |
//! | [`pipeline`] | CLI command implementations |

pub mod builder;
pub mod catalog;
pub mod chatbot;
pub mod chunk;
pub mod collector;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod progress;
pub mod retriever;
pub mod server;
pub mod snapshot;

#[cfg(test)]
mod testing;
