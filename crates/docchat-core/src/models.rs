//! Core data models.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the indexing and question-answering pipeline.

use serde::Serialize;

/// Extracted text of one uploaded document.
///
/// Held only for the duration of one indexing call; the session keeps the
/// chunks, not the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Display name, usually the uploaded file name.
    pub name: String,
    /// All pages concatenated in order.
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// A window of a document's text.
///
/// Offsets are in chars, `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub id: String,
    /// Name of the document this chunk was cut from.
    pub source: String,
    pub chunk_index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    /// Length of the chunk in chars.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Top-k chunks for one query, best match first.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub query: String,
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            hits: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|h| &h.chunk)
    }
}

/// Result of a successful question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    /// Chunks the answer was conditioned on, in descending similarity.
    pub sources: Vec<ScoredChunk>,
}
