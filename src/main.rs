//! # docchat CLI
//!
//! Ask questions about your PDFs from the terminal, or serve the same
//! pipeline over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! docchat [--config ./docchat.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat inspect --pdf a.pdf` | Extract and chunk; no external calls |
//! | `docchat ask --pdf a.pdf "question"` | Index the PDFs and answer one question |
//! | `docchat chat --pdf a.pdf --pdf b.pdf` | Interactive question loop |
//! | `docchat serve` | Start the HTTP server |
//!
//! Logs go to stderr and honour `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docchat::config::{self, Config};
use docchat::qa::QaService;
use docchat::{cli, server};

const DEFAULT_LOG_FILTER: &str = "docchat=info,docchat_core=info,tower_http=info";

/// docchat: chat with your PDFs.
///
/// Uploaded documents are chunked, embedded and held in memory for the
/// session; each question is answered from the most similar chunks plus
/// the conversation so far.
#[derive(Parser)]
#[command(name = "docchat", version, about = "Ask questions about your PDFs")]
struct Cli {
    /// Path to configuration file (TOML). Defaults apply without it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and chunk PDFs, printing per-file chunk counts.
    Inspect {
        /// PDF file to read (repeatable).
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,
    },

    /// Index PDFs and answer a single question.
    Ask {
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,

        /// Number of chunks to retrieve. Defaults to `retrieval.top_k`.
        #[arg(long)]
        k: Option<usize>,

        question: String,
    },

    /// Index PDFs and answer questions from stdin.
    Chat {
        #[arg(long = "pdf", required = true)]
        pdfs: Vec<PathBuf>,

        #[arg(long)]
        k: Option<usize>,
    },

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing();

    let cfg = match &args.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    match args.command {
        Commands::Inspect { pdfs } => {
            cli::run_inspect(&cfg, &pdfs)?;
        }
        Commands::Ask { pdfs, k, question } => {
            cli::run_ask(cfg, &pdfs, &question, k).await?;
        }
        Commands::Chat { pdfs, k } => {
            cli::run_chat(cfg, &pdfs, k).await?;
        }
        Commands::Serve => {
            let qa = QaService::from_config(cfg)?;
            server::run_server(qa).await?;
        }
    }

    Ok(())
}
