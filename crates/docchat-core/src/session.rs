//! Session context object.
//!
//! A [`Session`] owns one user's vector index and conversation memory. It is
//! created when the user starts, mutated only through `&mut self` by that
//! user's requests, and dropped when the user leaves. Nothing is shared
//! between sessions.
//!
//! ```text
//!   Empty ──index_document (≥1 chunk)──▶ Indexed ─┐
//!                                          ▲      │ ask
//!                                          └──────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::answer::{AnswerEngine, ChatModel, PromptBuilder};
use crate::chunk::{self, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::embedding::Embedder;
use crate::error::{CoreError, Result};
use crate::index::VectorIndex;
use crate::memory::ConversationMemory;
use crate::models::{Answer, Document};
use crate::retrieve::{Retriever, DEFAULT_TOP_K};

/// Chunking and retrieval settings fixed for a session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<()> {
        chunk::validate_params(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(CoreError::invalid_config("top_k must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No chunk has been indexed yet.
    Empty,
    /// At least one chunk is indexed; questions can be answered.
    Indexed,
}

/// One user's document set and conversation.
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    settings: SessionSettings,
    prompts: PromptBuilder,
    index: VectorIndex,
    memory: ConversationMemory,
    documents: Vec<String>,
}

impl Session {
    /// Start a session.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidConfiguration`] for bad chunking settings or a
    /// zero `top_k`.
    pub fn new(settings: SessionSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            settings,
            prompts: PromptBuilder::default(),
            index: VectorIndex::new(),
            memory: ConversationMemory::new(),
            documents: Vec::new(),
        })
    }

    /// Replace the prompt builder used for answers.
    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn state(&self) -> SessionState {
        if self.index.is_empty() {
            SessionState::Empty
        } else {
            SessionState::Indexed
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Names of the documents that contributed at least one chunk.
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    /// Chunk, embed, and index one document. Returns the number of chunks
    /// added.
    ///
    /// A document with no text adds nothing and is not recorded. If
    /// embedding fails, nothing from this document is indexed.
    ///
    /// # Errors
    ///
    /// See [`Session::index_documents`].
    pub async fn index_document(
        &mut self,
        document: &Document,
        embedder: &dyn Embedder,
    ) -> Result<usize> {
        let added = self
            .index_documents(std::slice::from_ref(document), embedder)
            .await?;
        Ok(added.iter().sum())
    }

    /// Chunk, embed, and index a set of documents as one unit. Returns the
    /// number of chunks added for each document, in order.
    ///
    /// Every document is embedded before anything is inserted, so a failure
    /// on any of them leaves the index as it was.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmbeddingService`] if the embedder fails or returns
    ///   the wrong number of vectors.
    /// - [`CoreError::InvalidArgument`] if the vectors do not match the
    ///   index dimension.
    pub async fn index_documents(
        &mut self,
        documents: &[Document],
        embedder: &dyn Embedder,
    ) -> Result<Vec<usize>> {
        let mut counts = Vec::with_capacity(documents.len());
        let mut all_chunks = Vec::new();
        let mut all_vectors = Vec::new();

        for document in documents {
            let chunks = chunk::chunk_text(
                &document.name,
                &document.text,
                self.settings.chunk_size,
                self.settings.chunk_overlap,
            )?;
            counts.push(chunks.len());
            if chunks.is_empty() {
                continue;
            }

            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_texts(&texts).await?;
            if vectors.len() != chunks.len() {
                return Err(CoreError::embedding(format!(
                    "expected {} vectors for {}, embedding service returned {}",
                    chunks.len(),
                    document.name,
                    vectors.len()
                )));
            }
            all_chunks.extend(chunks);
            all_vectors.extend(vectors);
        }

        self.index.add_batch(all_chunks, all_vectors)?;

        for (document, &added) in documents.iter().zip(&counts) {
            if added == 0 {
                continue;
            }
            self.documents.push(document.name.clone());
            info!(
                session = %self.id,
                document = %document.name,
                chunks = added,
                total = self.index.len(),
                "indexed document"
            );
        }
        Ok(counts)
    }

    /// Answer `question` using the session's configured `top_k`.
    pub async fn ask(
        &mut self,
        question: &str,
        embedder: &dyn Embedder,
        chat: &dyn ChatModel,
    ) -> Result<Answer> {
        let k = self.settings.top_k;
        self.ask_with_k(question, k, embedder, chat).await
    }

    /// Answer `question` from the `k` most similar chunks.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] for a blank question or `k == 0`.
    /// - [`CoreError::NoDocumentsIndexed`] if nothing has been indexed.
    /// - [`CoreError::EmbeddingService`] / [`CoreError::AnswerGeneration`]
    ///   from the external services, unchanged.
    pub async fn ask_with_k(
        &mut self,
        question: &str,
        k: usize,
        embedder: &dyn Embedder,
        chat: &dyn ChatModel,
    ) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CoreError::invalid_argument("question must not be empty"));
        }
        if k == 0 {
            return Err(CoreError::invalid_argument("k must be > 0"));
        }
        if self.index.is_empty() {
            return Err(CoreError::NoDocumentsIndexed);
        }

        let retrieval = Retriever::new(&self.index, embedder)
            .retrieve(question, k)
            .await?;

        AnswerEngine::with_prompts(chat, self.prompts.clone())
            .answer(question, retrieval, &mut self.memory)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Letter-frequency vector over a..z.
    struct LetterEmbedder;

    #[async_trait]
    impl Embedder for LetterEmbedder {
        fn model_name(&self) -> &str {
            "letters"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 26];
                    for b in t.to_ascii_lowercase().bytes() {
                        if b.is_ascii_lowercase() {
                            v[(b - b'a') as usize] += 1.0;
                        }
                    }
                    v[0] += 0.01;
                    v
                })
                .collect())
        }
    }

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0]])
        }
    }

    /// Fails every call after the first.
    struct FailsAfterFirst {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Embedder for FailsAfterFirst {
        fn model_name(&self) -> &str {
            "fails-after-first"
        }
        fn dims(&self) -> usize {
            26
        }
        async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call > 0 {
                return Err(CoreError::embedding("503 Service Unavailable"));
            }
            LetterEmbedder.embed_texts(texts).await
        }
    }

    struct EchoChat;

    #[async_trait]
    impl ChatModel for EchoChat {
        fn model_name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, prompt: &str) -> Result<String> {
            Ok(format!("{} chars of prompt", prompt.len()))
        }
    }

    struct DownChat;

    #[async_trait]
    impl ChatModel for DownChat {
        fn model_name(&self) -> &str {
            "down"
        }
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(CoreError::answer_generation("connection reset"))
        }
    }

    fn small_settings() -> SessionSettings {
        SessionSettings {
            chunk_size: 20,
            chunk_overlap: 5,
            top_k: 2,
        }
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let bad = SessionSettings {
            chunk_size: 10,
            chunk_overlap: 10,
            top_k: 4,
        };
        assert!(matches!(
            Session::new(bad),
            Err(CoreError::InvalidConfiguration(_))
        ));
        let bad = SessionSettings {
            top_k: 0,
            ..SessionSettings::default()
        };
        assert!(matches!(
            Session::new(bad),
            Err(CoreError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_ask_before_indexing() {
        let mut session = Session::new(small_settings()).unwrap();
        assert_eq!(session.state(), SessionState::Empty);
        let err = session
            .ask("anything?", &LetterEmbedder, &EchoChat)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoDocumentsIndexed));
    }

    #[tokio::test]
    async fn test_empty_document_keeps_session_empty() {
        let mut session = Session::new(small_settings()).unwrap();
        let added = session
            .index_document(&Document::new("blank.pdf", ""), &LetterEmbedder)
            .await
            .unwrap();
        assert_eq!(added, 0);
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.documents().is_empty());
    }

    #[tokio::test]
    async fn test_index_then_ask() {
        let mut session = Session::new(small_settings()).unwrap();
        let doc = Document::new(
            "notes.pdf",
            "zzzz zzzz zzzz zzzz zzzz. bbbb bbbb bbbb bbbb bbbb.",
        );
        let added = session.index_document(&doc, &LetterEmbedder).await.unwrap();
        assert_eq!(added, session.index().len());
        assert_eq!(session.state(), SessionState::Indexed);
        assert_eq!(session.documents(), &["notes.pdf".to_string()]);

        let answer = session
            .ask("zzz", &LetterEmbedder, &EchoChat)
            .await
            .unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources[0].chunk.text.contains('z'));
        assert!(answer.sources[0].score >= answer.sources[1].score);
        assert_eq!(session.memory().len(), 1);
        assert_eq!(session.state(), SessionState::Indexed);
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let mut session = Session::new(small_settings()).unwrap();
        let err = session
            .ask("   ", &LetterEmbedder, &EchoChat)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_failed_answer_does_not_touch_memory() {
        let mut session = Session::new(small_settings()).unwrap();
        session
            .index_document(&Document::new("a.pdf", "some text to index"), &LetterEmbedder)
            .await
            .unwrap();
        let err = session
            .ask("text?", &LetterEmbedder, &DownChat)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AnswerGeneration(_)));
        assert!(session.memory().is_empty());
    }

    #[tokio::test]
    async fn test_vector_count_mismatch_indexes_nothing() {
        let mut session = Session::new(small_settings()).unwrap();
        let doc = Document::new("long.pdf", "x".repeat(100));
        let err = session
            .index_document(&doc, &ShortEmbedder)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EmbeddingService(_)));
        assert_eq!(session.state(), SessionState::Empty);
    }

    #[tokio::test]
    async fn test_failure_on_later_document_indexes_nothing() {
        let mut session = Session::new(small_settings()).unwrap();
        let embedder = FailsAfterFirst {
            calls: Default::default(),
        };
        let docs = vec![
            Document::new("first.pdf", "alpha beta gamma delta"),
            Document::new("second.pdf", "epsilon zeta eta theta"),
        ];
        let err = session
            .index_documents(&docs, &embedder)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::EmbeddingService(_)));
        assert_eq!(session.state(), SessionState::Empty);
        assert!(session.documents().is_empty());

        let counts = session
            .index_documents(&docs, &LetterEmbedder)
            .await
            .unwrap();
        assert_eq!(counts.len(), 2);
        assert_eq!(counts.iter().sum::<usize>(), session.index().len());
        assert_eq!(session.documents(), &["first.pdf".to_string(), "second.pdf".to_string()]);
    }
}
