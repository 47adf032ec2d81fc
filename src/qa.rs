//! Question-answering service.
//!
//! [`QaService`] binds the configuration, the embedding provider and the
//! chat model, and drives the two phases of a [`Session`]:
//!
//! 1. **Ingest**: extract every uploaded PDF on the blocking pool, then
//!    chunk, embed and index the documents as one unit. A file that cannot
//!    be read is skipped and reported. Extraction needs no session, so the
//!    server runs it before taking the session lock.
//! 2. **Ask**: retrieve the closest chunks and have the chat model answer,
//!    returning sources ready for display.
//!
//! Both the CLI and the HTTP server go through this type.

use std::sync::Arc;

use docchat_core::{ChatModel, CoreError, Document, Embedder, PromptBuilder, Session};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::display::snippet;
use crate::embedding::create_embedder;
use crate::extract::extract_document;
use crate::llm::create_chat_model;

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

/// Text pulled from a batch of uploads, ready to index.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub documents: Vec<Document>,
    pub skipped: Vec<SkippedFile>,
}

/// Outcome of one ingest call.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestReport {
    /// Names of the documents that were indexed.
    pub documents: Vec<String>,
    /// Chunks added by this call.
    pub chunks: usize,
    /// Chunks in the session after this call.
    pub total_chunks: usize,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Error)]
pub enum QaError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("no text could be extracted from the uploaded files")]
    NothingExtracted { skipped: Vec<SkippedFile> },
}

/// A source chunk as shown to people.
#[derive(Debug, Clone, Serialize)]
pub struct SourceView {
    pub source: String,
    pub chunk_index: usize,
    pub score: f32,
    /// Text cut to `display.snippet_chars`.
    pub snippet: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerView {
    pub answer: String,
    pub sources: Vec<SourceView>,
}

#[derive(Clone)]
pub struct QaService {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    prompts: PromptBuilder,
}

impl QaService {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, chat: Arc<dyn ChatModel>) -> Self {
        let prompts = match &config.llm.system_prompt {
            Some(system) => PromptBuilder::new().with_system(system.clone()),
            None => PromptBuilder::new(),
        };
        Self {
            config: Arc::new(config),
            embedder,
            chat,
            prompts,
        }
    }

    /// Build the providers named in `config`.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let embedder = create_embedder(&config.embedding)?;
        let chat = create_chat_model(&config.llm)?;
        info!(
            embedder = embedder.model_name(),
            chat = chat.model_name(),
            "providers ready"
        );
        Ok(Self::new(config, embedder, chat))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn new_session(&self) -> Result<Session, CoreError> {
        Ok(Session::new(self.config.session_settings())?.with_prompts(self.prompts.clone()))
    }

    /// Extract and index `uploads` into `session`.
    ///
    /// # Errors
    ///
    /// See [`QaService::extract`] and [`QaService::index`].
    pub async fn ingest(
        &self,
        session: &mut Session,
        uploads: Vec<Upload>,
    ) -> Result<IngestReport, QaError> {
        let extracted = self.extract(uploads).await?;
        self.index(session, extracted).await
    }

    /// Pull the text out of every upload. PDF parsing is CPU-bound, so each
    /// file is handled on the blocking pool.
    ///
    /// Files that are not PDFs, fail to parse, or contain no text are
    /// skipped and listed.
    ///
    /// # Errors
    ///
    /// [`QaError::NothingExtracted`] if no file yields any text.
    pub async fn extract(&self, uploads: Vec<Upload>) -> Result<Extracted, QaError> {
        let mut documents = Vec::new();
        let mut skipped = Vec::new();

        for upload in uploads {
            let name = upload.name.clone();
            let outcome = tokio::task::spawn_blocking(move || {
                extract_document(&upload.name, &upload.bytes).map_err(|e| e.to_string())
            })
            .await
            .unwrap_or_else(|e| Err(format!("extraction task failed: {}", e)));

            match outcome {
                Ok(doc) if doc.text.trim().is_empty() => {
                    warn!(file = %name, "no extractable text, skipping");
                    skipped.push(SkippedFile {
                        name,
                        reason: "no extractable text".to_string(),
                    });
                }
                Ok(doc) => documents.push(doc),
                Err(reason) => {
                    warn!(file = %name, error = %reason, "extraction failed, skipping");
                    skipped.push(SkippedFile { name, reason });
                }
            }
        }

        if documents.is_empty() {
            return Err(QaError::NothingExtracted { skipped });
        }
        Ok(Extracted { documents, skipped })
    }

    /// Chunk, embed and index extracted documents into `session`.
    ///
    /// # Errors
    ///
    /// [`QaError::Core`] if embedding fails. Nothing from this batch is
    /// indexed in that case, so the whole upload can be retried.
    pub async fn index(
        &self,
        session: &mut Session,
        extracted: Extracted,
    ) -> Result<IngestReport, QaError> {
        let Extracted { documents, skipped } = extracted;
        let counts = session
            .index_documents(&documents, self.embedder.as_ref())
            .await?;

        let mut indexed = Vec::with_capacity(documents.len());
        let mut chunks = 0;
        for (doc, added) in documents.into_iter().zip(counts) {
            if added > 0 {
                indexed.push(doc.name);
                chunks += added;
            }
        }

        info!(
            session = %session.id(),
            documents = indexed.len(),
            chunks,
            skipped = skipped.len(),
            "ingest complete"
        );

        Ok(IngestReport {
            documents: indexed,
            chunks,
            total_chunks: session.index().len(),
            skipped,
        })
    }

    /// Answer `question` from the session's documents. `k` defaults to
    /// `retrieval.top_k`.
    pub async fn ask(
        &self,
        session: &mut Session,
        question: &str,
        k: Option<usize>,
    ) -> Result<AnswerView, CoreError> {
        let k = k.unwrap_or(session.settings().top_k);
        let answer = session
            .ask_with_k(question, k, self.embedder.as_ref(), self.chat.as_ref())
            .await?;

        let max_chars = self.config.display.snippet_chars;
        let sources = answer
            .sources
            .into_iter()
            .map(|hit| SourceView {
                source: hit.chunk.source,
                chunk_index: hit.chunk.chunk_index,
                score: hit.score,
                snippet: snippet(&hit.chunk.text, max_chars),
                text: hit.chunk.text,
            })
            .collect();

        Ok(AnswerView {
            answer: answer.answer,
            sources,
        })
    }
}
