//! In-process vector index.
//!
//! An append-only list of (chunk, vector) entries with brute-force cosine
//! similarity search. Vectors are computed once, when the chunk is added,
//! and reused for every query.
//!
//! # Search
//!
//! 1. Score every entry against the query with [`cosine_similarity`].
//! 2. Keep the best `k` in a bounded max-heap whose top is the worst
//!    candidate kept so far, so selection costs `O(n log k)`.
//! 3. Return them best first. Equal scores keep insertion order, earliest
//!    first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tracing::debug;

use crate::embedding::cosine_similarity;
use crate::error::{CoreError, Result};
use crate::models::{Chunk, ScoredChunk};

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Append-only store of chunk embeddings for one session.
///
/// The dimension is fixed by the first vector added; every later vector
/// and every query must match it.
#[derive(Default)]
pub struct VectorIndex {
    dims: Option<usize>,
    entries: Vec<IndexEntry>,
}

/// A search candidate ordered so that a *greater* value is a *worse* hit:
/// lower score, or equal score and later insertion.
struct Ranked {
    score: f32,
    position: usize,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then(self.position.cmp(&other.position))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector dimension, once known.
    pub fn dims(&self) -> Option<usize> {
        self.dims
    }

    /// Stored chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }

    /// Append one entry. Identical chunks are stored again, not merged.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArgument`] if the vector is empty, has a
    /// non-finite component, or does not match the index dimension.
    pub fn add(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<()> {
        let dims = self.check_vector(&vector, self.dims)?;
        self.dims = Some(dims);
        self.entries.push(IndexEntry { chunk, vector });
        Ok(())
    }

    /// Append a batch of entries, pairing `chunks[i]` with `vectors[i]`.
    ///
    /// Every pair is validated before anything is inserted, so a failed
    /// batch leaves the index untouched.
    pub fn add_batch(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(CoreError::invalid_argument(format!(
                "got {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let mut dims = self.dims;
        for vector in &vectors {
            dims = Some(self.check_vector(vector, dims)?);
        }

        self.dims = dims;
        self.entries.reserve(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            self.entries.push(IndexEntry { chunk, vector });
        }
        Ok(())
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// An empty index yields an empty result. If `k` exceeds the number of
    /// entries, every entry is returned.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidArgument`] if `k == 0` or the query dimension
    /// differs from the index dimension.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(CoreError::invalid_argument("k must be > 0"));
        }
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(dims) = self.dims {
            if query.len() != dims {
                return Err(CoreError::invalid_argument(format!(
                    "query vector has {} dimensions, index has {}",
                    query.len(),
                    dims
                )));
            }
        }

        let k = k.min(self.entries.len());
        let mut heap: BinaryHeap<Ranked> = BinaryHeap::with_capacity(k + 1);
        for (position, entry) in self.entries.iter().enumerate() {
            let score = cosine_similarity(query, &entry.vector);
            heap.push(Ranked { score, position });
            if heap.len() > k {
                heap.pop();
            }
        }

        let hits: Vec<ScoredChunk> = heap
            .into_sorted_vec()
            .into_iter()
            .map(|r| ScoredChunk {
                chunk: self.entries[r.position].chunk.clone(),
                score: r.score,
            })
            .collect();

        debug!(
            entries = self.entries.len(),
            k,
            returned = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "vector search"
        );

        Ok(hits)
    }

    fn check_vector(&self, vector: &[f32], dims: Option<usize>) -> Result<usize> {
        if vector.is_empty() {
            return Err(CoreError::invalid_argument("vector must not be empty"));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(CoreError::invalid_argument(
                "vector contains a non-finite component",
            ));
        }
        match dims {
            Some(d) if d != vector.len() => Err(CoreError::invalid_argument(format!(
                "vector has {} dimensions, index has {}",
                vector.len(),
                d
            ))),
            _ => Ok(vector.len()),
        }
    }
}
