//! Query-time retrieval: embed the question, search the index.

use tracing::debug;

use crate::embedding::Embedder;
use crate::error::{CoreError, Result};
use crate::index::VectorIndex;
use crate::models::RetrievalResult;

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;

/// Binds a [`VectorIndex`] to the [`Embedder`] that produced its vectors.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    /// Return the `k` chunks most similar to `query`.
    ///
    /// An empty index or a blank query gives an empty result without
    /// calling the embedding service. Embedding failures are returned
    /// unchanged; there is no retry here.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidArgument`] if `k == 0` or the query vector
    ///   does not match the index dimension.
    /// - [`CoreError::EmbeddingService`] from the embedder.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(CoreError::invalid_argument("k must be > 0"));
        }
        if self.index.is_empty() || query.trim().is_empty() {
            debug!(entries = self.index.len(), "nothing to retrieve");
            return Ok(RetrievalResult::empty(query));
        }

        let query_vec = self.embedder.embed_query(query).await?;
        let hits = self.index.search(&query_vec, k)?;

        debug!(
            model = self.embedder.model_name(),
            k,
            hits = hits.len(),
            "retrieved context"
        );

        Ok(RetrievalResult {
            query: query.to_string(),
            hits,
        })
    }
}
