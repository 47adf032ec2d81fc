//! CLI command implementations.
//!
//! `inspect` runs extraction and chunking only. `ask` and `chat` build a
//! throwaway session from the given PDFs and query it; nothing outlives the
//! process.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use docchat_core::chunk::chunk_text;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::display::snippet;
use crate::extract::read_document;
use crate::qa::{AnswerView, IngestReport, QaError, QaService, Upload};

/// Extract and chunk each PDF and print what would be indexed.
pub fn run_inspect(config: &Config, pdfs: &[PathBuf]) -> Result<()> {
    let mut total = 0;
    for path in pdfs {
        let doc = match read_document(path) {
            Ok(doc) => doc,
            Err(e) => {
                println!("skipped {}: {}", path.display(), e);
                continue;
            }
        };
        let chunks = chunk_text(
            &doc.name,
            &doc.text,
            config.chunking.size,
            config.chunking.overlap,
        )?;
        println!(
            "{}: {} chars, {} chunks",
            doc.name,
            doc.text.chars().count(),
            chunks.len()
        );
        if let Some(first) = chunks.first() {
            println!("  first chunk: {}", one_line(&snippet(&first.text, 80)));
        }
        total += chunks.len();
    }
    println!("total chunks: {}", total);
    Ok(())
}

/// Index the PDFs and answer one question.
pub async fn run_ask(
    config: Config,
    pdfs: &[PathBuf],
    question: &str,
    k: Option<usize>,
) -> Result<()> {
    let qa = QaService::from_config(config)?;
    let mut session = qa.new_session()?;
    let report = ingest(&qa, &mut session, pdfs).await?;
    print_report(&report);

    let view = qa.ask(&mut session, question, k).await?;
    print_answer(&view);
    Ok(())
}

/// Index the PDFs, then answer questions read from stdin until EOF or
/// `exit`. A failed question is reported and the loop continues; the
/// conversation carries over between questions.
pub async fn run_chat(config: Config, pdfs: &[PathBuf], k: Option<usize>) -> Result<()> {
    let qa = QaService::from_config(config)?;
    let mut session = qa.new_session()?;
    let report = ingest(&qa, &mut session, pdfs).await?;
    print_report(&report);
    println!("Ask a question about your documents (\"exit\" to quit).");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        match qa.ask(&mut session, question, k).await {
            Ok(view) => print_answer(&view),
            Err(e) if e.is_retryable() => println!("error: {} (try again)", e),
            Err(e) => println!("error: {}", e),
        }
    }
    Ok(())
}

async fn ingest(
    qa: &QaService,
    session: &mut docchat_core::Session,
    pdfs: &[PathBuf],
) -> Result<IngestReport> {
    let uploads = pdfs
        .iter()
        .map(|p| load_upload(p))
        .collect::<Result<Vec<_>>>()?;

    match qa.ingest(session, uploads).await {
        Ok(report) => Ok(report),
        Err(QaError::NothingExtracted { skipped }) => {
            for file in &skipped {
                eprintln!("skipped {}: {}", file.name, file.reason);
            }
            anyhow::bail!("no text could be extracted from the given PDFs")
        }
        Err(QaError::Core(e)) => Err(e.into()),
    }
}

fn load_upload(path: &Path) -> Result<Upload> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(name, bytes))
}

fn print_report(report: &IngestReport) {
    for file in &report.skipped {
        println!("skipped {}: {}", file.name, file.reason);
    }
    println!(
        "indexed {} document(s), {} chunks",
        report.documents.len(),
        report.total_chunks
    );
}

fn print_answer(view: &AnswerView) {
    println!();
    println!("{}", view.answer);
    if view.sources.is_empty() {
        return;
    }
    println!();
    println!("Sources:");
    for (i, source) in view.sources.iter().enumerate() {
        println!(
            "{}. {} #{} (score {:.3})",
            i + 1,
            source.source,
            source.chunk_index,
            source.score
        );
        println!("   {}", one_line(&source.snippet));
    }
    println!();
}

fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
