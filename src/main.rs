//! # Sefaria RAG CLI (`sefaria-rag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sefaria-rag collect` | Download every catalog text and report counts |
//! | `sefaria-rag build` | Collect, clean, and build the chatbot |
//! | `sefaria-rag ask "<question>"` | Answer a question from retrieved passages |
//! | `sefaria-rag search "<query>"` | Show the passages retrieval would use |
//! | `sefaria-rag serve` | Start the JSON HTTP API |
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`
//! (default `sefaria_rag=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sefaria_rag::config;
use sefaria_rag::pipeline;
use sefaria_rag::progress::ProgressMode;
use sefaria_rag::retriever::SearchMode;

/// Sefaria RAG: collect Sefaria texts, clean them, and ask questions over
/// them with retrieval-augmented generation.
#[derive(Parser)]
#[command(name = "sefaria-rag", version)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults are used when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/sefaria-rag.toml")]
    config: PathBuf,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the catalog and fetch every text.
    Collect {
        /// Only fetch the first N titles.
        #[arg(long)]
        limit: Option<usize>,

        /// Write the raw `title → text` corpus as JSON.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Collect, clean, and build the RAG chatbot.
    Build {
        /// Only fetch the first N titles.
        #[arg(long)]
        limit: Option<usize>,

        /// Save the built index as a JSON snapshot.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Ask a question.
    ///
    /// Loads `--index` when given; otherwise builds from the live catalog.
    Ask {
        question: String,

        #[arg(long)]
        index: Option<PathBuf>,

        /// Maximum number of passages to retrieve.
        #[arg(long)]
        limit: Option<usize>,

        /// Retrieval mode (defaults to hybrid with embeddings, keyword without).
        #[arg(long, value_enum)]
        mode: Option<SearchMode>,
    },

    /// Retrieve passages without generating an answer.
    Search {
        query: String,

        #[arg(long)]
        index: Option<PathBuf>,

        #[arg(long)]
        limit: Option<usize>,

        #[arg(long, value_enum)]
        mode: Option<SearchMode>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve {
        #[arg(long)]
        index: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sefaria_rag=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Collect { limit, output } => {
            pipeline::run_collect(&cfg, limit, output.as_deref(), progress).await?;
        }
        Commands::Build { limit, output } => {
            pipeline::run_build(&cfg, limit, output.as_deref(), progress).await?;
        }
        Commands::Ask {
            question,
            index,
            limit,
            mode,
        } => {
            pipeline::run_ask(&cfg, &question, index.as_deref(), limit, mode, progress).await?;
        }
        Commands::Search {
            query,
            index,
            limit,
            mode,
        } => {
            pipeline::run_search(&cfg, &query, index.as_deref(), limit, mode, progress).await?;
        }
        Commands::Serve { index } => {
            pipeline::run_serve(&cfg, index.as_deref(), progress).await?;
        }
    }

    Ok(())
}
