#![allow(dead_code)]

use async_trait::async_trait;
use docchat_core::{ChatModel, CoreError, Embedder};

/// Single-page PDF whose text layer contains `phrase` (Helvetica, no
/// escaping, so keep it to plain ASCII without parentheses).
pub fn minimal_pdf(phrase: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Letter-frequency vectors over a..z; deterministic and offline.
pub struct LetterEmbedder;

#[async_trait]
impl Embedder for LetterEmbedder {
    fn model_name(&self) -> &str {
        "letters"
    }
    fn dims(&self) -> usize {
        26
    }
    async fn embed_texts(&self, texts: &[String]) -> docchat_core::Result<Vec<Vec<f32>>> {
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

/// Replies with the length of the prompt it was given.
pub struct CountingChat;

#[async_trait]
impl ChatModel for CountingChat {
    fn model_name(&self) -> &str {
        "counting"
    }
    async fn complete(&self, prompt: &str) -> docchat_core::Result<String> {
        Ok(format!("Read a {}-char prompt.", prompt.len()))
    }
}

pub struct UnavailableChat;

#[async_trait]
impl ChatModel for UnavailableChat {
    fn model_name(&self) -> &str {
        "unavailable"
    }
    async fn complete(&self, _prompt: &str) -> docchat_core::Result<String> {
        Err(CoreError::answer_generation("503 Service Unavailable"))
    }
}
