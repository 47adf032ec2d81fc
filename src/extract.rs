//! PDF text extraction.
//!
//! Uploads arrive as a name plus raw bytes; this module turns them into a
//! [`Document`] holding the text of every page, in page order. A file that
//! fails here is skipped by the caller and reported back, so nothing in this
//! module panics or aborts a batch.

use std::path::Path;

use docchat_core::Document;
use thiserror::Error;

/// Every PDF starts with this header.
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{0} is not a PDF")]
    NotPdf(String),

    #[error("PDF extraction failed for {name}: {reason}")]
    Pdf { name: String, reason: String },

    #[error("failed to read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// True if `bytes` carry the PDF header (leading whitespace allowed).
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(PDF_MAGIC)
}

/// Extract the text of an uploaded PDF.
///
/// The returned document may have empty text (a scanned PDF without a text
/// layer); the session indexes nothing for it.
pub fn extract_document(name: &str, bytes: &[u8]) -> Result<Document, ExtractError> {
    if !looks_like_pdf(bytes) {
        return Err(ExtractError::NotPdf(name.to_string()));
    }

    // pdf-extract panics on some malformed inputs.
    let result = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));
    let text = match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            return Err(ExtractError::Pdf {
                name: name.to_string(),
                reason: e.to_string(),
            })
        }
        Err(_) => {
            return Err(ExtractError::Pdf {
                name: name.to_string(),
                reason: "parser panicked on malformed input".to_string(),
            })
        }
    };

    Ok(Document::new(name, text))
}

/// Read a PDF from disk. The document is named after the file name.
pub fn read_document(path: &Path) -> Result<Document, ExtractError> {
    let name = display_name(path);
    let bytes = std::fs::read(path).map_err(|source| ExtractError::Io {
        name: name.clone(),
        source,
    })?;
    extract_document(&name, &bytes)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_check() {
        assert!(looks_like_pdf(b"%PDF-1.4\n..."));
        assert!(looks_like_pdf(b"\r\n%PDF-1.7"));
        assert!(!looks_like_pdf(b"PK\x03\x04"));
        assert!(!looks_like_pdf(b""));
    }

    #[test]
    fn test_not_a_pdf() {
        let err = extract_document("notes.txt", b"plain text").unwrap_err();
        assert!(matches!(err, ExtractError::NotPdf(ref n) if n == "notes.txt"));
    }

    #[test]
    fn test_corrupt_pdf_returns_error() {
        let err = extract_document("bad.pdf", b"%PDF-1.4\ngarbage").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_document(&dir.path().join("gone.pdf")).unwrap_err();
        match err {
            ExtractError::Io { name, .. } => assert_eq!(name, "gone.pdf"),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
