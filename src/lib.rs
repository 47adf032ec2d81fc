//! # docchat
//!
//! Chat with your PDFs: upload documents, then ask questions answered from
//! the most relevant passages and the conversation so far.
//!
//! The pipeline logic (chunking, vector index, retrieval, answering,
//! sessions) lives in `docchat-core`. This crate adds everything that talks
//! to the outside world.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │ PDF bytes│──▶│ extract      │──▶│ Session      │◀── Embedder
//! └──────────┘   │ (pdf-extract)│   │ chunk+index  │◀── ChatModel
//!                └──────────────┘   └──────┬───────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │(docchat) │       │ (axum)   │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | PDF text extraction |
//! | [`embedding`] | Embedding providers (OpenAI, Ollama, local fastembed) |
//! | [`llm`] | Chat model clients (OpenAI-compatible, Ollama) |
//! | [`qa`] | Ingest and ask over a session |
//! | [`sessions`] | In-memory session registry |
//! | [`server`] | HTTP server |
//! | [`cli`] | CLI command implementations |

pub mod cli;
pub mod config;
pub mod display;
pub mod embedding;
pub mod extract;
mod http;
pub mod llm;
pub mod qa;
pub mod server;
pub mod sessions;
