//! CLI command implementations: collect → clean → build, then ask,
//! search, or serve.
//!
//! Each `run_*` function prints a short human summary on stdout and
//! returns an error for anything fatal. Progress goes to stderr through
//! the selected [`ProgressMode`].

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::builder::{ChatbotBuilder, LoadedModels};
use crate::catalog::SefariaClient;
use crate::chatbot::RagChatbot;
use crate::collector::DataCollector;
use crate::config::Config;
use crate::models::{Corpus, RetrievedPassage};
use crate::preprocess::TextPreprocessor;
use crate::progress::ProgressMode;
use crate::retriever::SearchMode;
use crate::server;
use crate::snapshot::Snapshot;

pub const BUILD_SUCCESS: &str = "Chatbot built successfully with RAG model!";

/// List the catalog and fetch every text. `limit` overrides `catalog.limit`.
pub async fn collect_corpus(
    config: &Config,
    limit: Option<usize>,
    progress: ProgressMode,
) -> Result<Corpus> {
    let client = SefariaClient::new(&config.catalog)?;
    let collector = DataCollector::new(client)
        .with_policy(config.catalog.fetch_policy)
        .with_limit(limit.or(config.catalog.limit))
        .with_request_delay(Duration::from_millis(config.catalog.request_delay_ms))
        .with_progress(progress.reporter());

    let corpus = collector.collect_all().await?;
    tracing::debug!(texts = corpus.len(), chars = corpus.total_chars(), "corpus ready");
    Ok(corpus)
}

/// Collect and clean, then build a chatbot with the configured models.
pub async fn build_chatbot(
    config: &Config,
    limit: Option<usize>,
    progress: ProgressMode,
) -> Result<RagChatbot> {
    let corpus = collect_corpus(config, limit, progress).await?;
    let cleaned = TextPreprocessor::from_config(&config.preprocess).clean_corpus(&corpus);

    let chatbot = ChatbotBuilder::new(config)
        .with_progress(progress.reporter())
        .build(&cleaned)
        .await?;
    Ok(chatbot)
}

/// Restore from `index` when given, otherwise build from the live catalog.
pub async fn load_chatbot(
    config: &Config,
    index: Option<&Path>,
    progress: ProgressMode,
) -> Result<RagChatbot> {
    match index {
        Some(path) => {
            let snapshot = Snapshot::load(path)?;
            let models = LoadedModels::from_config(config)?;
            let chatbot = snapshot.into_chatbot(models, config)?;
            tracing::info!(
                path = %path.display(),
                passages = chatbot.index().len(),
                "index restored"
            );
            Ok(chatbot)
        }
        None => build_chatbot(config, None, progress).await,
    }
}

pub async fn run_collect(
    config: &Config,
    limit: Option<usize>,
    output: Option<&Path>,
    progress: ProgressMode,
) -> Result<()> {
    let corpus = collect_corpus(config, limit, progress).await?;

    println!("collect");
    println!("  texts collected: {}", corpus.len());
    println!("  characters: {}", corpus.total_chars());

    if let Some(path) = output {
        write_json(path, &corpus)?;
        println!("  written: {}", path.display());
    }
    println!("ok");
    Ok(())
}

pub async fn run_build(
    config: &Config,
    limit: Option<usize>,
    output: Option<&Path>,
    progress: ProgressMode,
) -> Result<()> {
    let chatbot = build_chatbot(config, limit, progress).await?;
    let index = chatbot.index();

    println!("build");
    println!("  documents: {}", index.document_count());
    println!("  passages: {}", index.len());
    println!(
        "  embedding model: {}",
        chatbot.embedding_model().unwrap_or("disabled")
    );
    println!("  generator: {}", chatbot.generator_name());

    if let Some(path) = output {
        Snapshot::from_chatbot(&chatbot).save(path)?;
        println!("  snapshot: {}", path.display());
    }
    println!("{}", BUILD_SUCCESS);
    Ok(())
}

pub async fn run_ask(
    config: &Config,
    question: &str,
    index: Option<&Path>,
    limit: Option<usize>,
    mode: Option<SearchMode>,
    progress: ProgressMode,
) -> Result<()> {
    let chatbot = load_chatbot(config, index, progress).await?;
    let answer = chatbot.ask(question, mode, limit).await?;

    println!("{}", answer.text);
    if !answer.passages.is_empty() {
        println!();
        println!("Sources:");
        for (i, p) in answer.passages.iter().enumerate() {
            println!("  {}. {} (passage {}, score {:.2})", i + 1, p.title, p.chunk_index, p.score);
        }
    }
    Ok(())
}

pub async fn run_search(
    config: &Config,
    query: &str,
    index: Option<&Path>,
    limit: Option<usize>,
    mode: Option<SearchMode>,
    progress: ProgressMode,
) -> Result<()> {
    let chatbot = load_chatbot(config, index, progress).await?;
    let results = chatbot.search(query, mode, limit).await?;
    print_results(&results);
    Ok(())
}

pub async fn run_serve(config: &Config, index: Option<&Path>, progress: ProgressMode) -> Result<()> {
    let chatbot = load_chatbot(config, index, progress).await?;
    server::run_server(config, Arc::new(chatbot)).await
}

fn print_results(results: &[RetrievedPassage]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} (passage {})",
            i + 1,
            result.score,
            result.title,
            result.chunk_index
        );
        println!("    excerpt: \"{}\"", excerpt(&result.text, 200));
        println!("    id: {}", result.id);
        println!();
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat.to_string(),
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
