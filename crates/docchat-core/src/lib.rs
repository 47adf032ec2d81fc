//! # docchat core
//!
//! Runtime-free logic for docchat: data models, the error taxonomy, the
//! overlapping-window chunker, the in-process vector index, retrieval,
//! conversation memory, the answering engine, and the session object that
//! ties them together.
//!
//! This crate contains no tokio, HTTP, or filesystem code. External services
//! (embedding models and chat models) are reached through the [`Embedder`]
//! and [`ChatModel`] traits, which the application crate implements.
//!
//! ```text
//!  Document ─▶ chunk ─▶ Embedder ─▶ VectorIndex        (build phase)
//!  question ─▶ Retriever ─▶ AnswerEngine ─▶ Answer      (query phase)
//! ```

pub mod answer;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod memory;
pub mod models;
pub mod retrieve;
pub mod session;

pub use answer::{AnswerEngine, ChatModel, PromptBuilder};
pub use embedding::Embedder;
pub use error::{CoreError, Result};
pub use index::VectorIndex;
pub use memory::{ConversationMemory, Turn};
pub use models::{Answer, Chunk, Document, RetrievalResult, ScoredChunk};
pub use retrieve::Retriever;
pub use session::{Session, SessionSettings, SessionState};
