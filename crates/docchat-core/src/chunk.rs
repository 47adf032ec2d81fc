//! Fixed-size, overlapping-window text chunker.
//!
//! Splits a document's text into [`Chunk`]s of `size` chars, each starting
//! `size - overlap` chars after the previous one, so neighbouring chunks
//! share exactly `overlap` chars. The last chunk covers whatever remains
//! and may be shorter than `size`.
//!
//! Lengths and offsets count chars, not bytes, so a window never cuts a
//! multi-byte UTF-8 sequence in half.
//!
//! Each chunk receives a random UUID plus a SHA-256 hash of its text.
//!
//! # Example
//!
//! ```rust
//! use docchat_core::chunk::chunk_text;
//!
//! let text = "a".repeat(1000);
//! let chunks = chunk_text("report.pdf", &text, 500, 150).unwrap();
//! let spans: Vec<_> = chunks.iter().map(|c| (c.start, c.end)).collect();
//! assert_eq!(spans, vec![(0, 500), (350, 850), (700, 1000)]);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::models::Chunk;

/// Default window length, in chars.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap between neighbouring windows, in chars.
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;

/// Check that `size > 0` and `overlap < size`.
pub fn validate_params(size: usize, overlap: usize) -> Result<()> {
    if size == 0 {
        return Err(CoreError::invalid_config("chunk size must be > 0"));
    }
    if overlap >= size {
        return Err(CoreError::invalid_config(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, size
        )));
    }
    Ok(())
}

/// Split `text` into overlapping windows.
///
/// # Guarantees
///
/// - Empty text yields no chunks.
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`, in document order.
/// - Every chunk but the last is exactly `size` chars long.
/// - Chunk `i + 1` starts `size - overlap` chars after chunk `i`.
///
/// # Errors
///
/// [`CoreError::InvalidConfiguration`] if `size == 0` or `overlap >= size`.
pub fn chunk_text(source: &str, text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    validate_params(size, overlap)?;

    // Byte offset of every char position, plus the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let step = size - overlap;
    let mut chunks = Vec::with_capacity(expected_count(total, size, overlap));
    let mut start = 0;

    while start < total {
        let end = if total - start <= size {
            total
        } else {
            start + size
        };
        let piece = &text[offsets[start]..offsets[end]];
        chunks.push(make_chunk(source, chunks.len(), start, end, piece));
        if end == total {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Number of chunks [`chunk_text`] produces for a text of `len` chars.
pub fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
    if len == 0 || size == 0 || overlap >= size {
        return 0;
    }
    if len <= size {
        return 1;
    }
    let step = size - overlap;
    (len - overlap).div_ceil(step)
}

/// Create a single [`Chunk`] with a UUID and SHA-256 content hash.
fn make_chunk(source: &str, index: usize, start: usize, end: usize, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        source: source.to_string(),
        chunk_index: index,
        start,
        end,
        text: text.to_string(),
        hash,
    }
}
