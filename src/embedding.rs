//! Embedding providers.
//!
//! Concrete implementations of the core [`Embedder`] trait:
//! - **[`DisabledEmbedder`]**: fails every call; documents cannot be indexed.
//! - **[`OpenAIEmbedder`]**: `POST {url}/embeddings` on any OpenAI-compatible API.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama instance.
//! - **[`LocalEmbedder`]**: runs the model in-process via fastembed
//!   (feature `local-embeddings`, on by default). The default model is
//!   `all-minilm-l6-v2`; it is downloaded from Hugging Face on first use.
//!
//! Use [`create_embedder`] to pick one from configuration.
//!
//! Every provider sends at most `batch_size` texts per request, checks that
//! each returned vector has the configured dimension, and reports any
//! failure as [`CoreError::EmbeddingService`].

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat_core::{CoreError, Embedder};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::http;

const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// Create the embedder named by `config.provider`.
///
/// | Config value | Embedder |
/// |--------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"`   | [`OpenAIEmbedder`] (reads `OPENAI_API_KEY`) |
/// | `"ollama"`   | [`OllamaEmbedder`] |
/// | `"local"`    | [`LocalEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => {
            let api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
            Ok(Arc::new(OpenAIEmbedder::new(config, api_key)?))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled ============

pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_texts(&self, _texts: &[String]) -> docchat_core::Result<Vec<Vec<f32>>> {
        Err(CoreError::embedding("embedding provider is disabled"))
    }
}

// ============ Remote settings shared by OpenAI and Ollama ============

struct Remote {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
}

impl Remote {
    fn new(config: &EmbeddingConfig, provider: &str, default_url: &str) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for {} provider", provider))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for {} provider", provider))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| default_url.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model,
            dims,
            url,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
        })
    }
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    remote: Remote,
    api_key: String,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            remote: Remote::new(config, "OpenAI", DEFAULT_OPENAI_URL)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.remote.model
    }
    fn dims(&self) -> usize {
        self.remote.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> docchat_core::Result<Vec<Vec<f32>>> {
        let r = &self.remote;
        let url = format!("{}/embeddings", r.url);
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(r.batch_size) {
            let body = json!({ "model": r.model, "input": batch });
            let reply = http::post_json(
                &r.client,
                "OpenAI embeddings",
                &url,
                Some(&self.api_key),
                &body,
                r.max_retries,
            )
            .await
            .map_err(|e| CoreError::embedding(e.to_string()))?;

            let vectors = parse_openai_response(&reply).map_err(CoreError::embedding)?;
            check_batch(batch.len(), &vectors, r.dims)?;
            debug!(model = %r.model, batch = batch.len(), "embedded batch");
            out.extend(vectors);
        }

        Ok(out)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &Value) -> std::result::Result<Vec<Vec<f32>>, String> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or("invalid OpenAI response: missing data array")?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or("invalid OpenAI response: missing embedding")?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, to_vector(embedding)?));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    remote: Remote,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            remote: Remote::new(config, "Ollama", DEFAULT_OLLAMA_URL)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.remote.model
    }
    fn dims(&self) -> usize {
        self.remote.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> docchat_core::Result<Vec<Vec<f32>>> {
        let r = &self.remote;
        let url = format!("{}/api/embed", r.url);
        let mut out = Vec::with_capacity(texts.len());

        for batch in texts.chunks(r.batch_size) {
            let body = json!({ "model": r.model, "input": batch });
            let reply = http::post_json(&r.client, "Ollama", &url, None, &body, r.max_retries)
                .await
                .map_err(|e| CoreError::embedding(e.to_string()))?;

            let vectors = parse_ollama_response(&reply).map_err(CoreError::embedding)?;
            check_batch(batch.len(), &vectors, r.dims)?;
            debug!(model = %r.model, batch = batch.len(), "embedded batch");
            out.extend(vectors);
        }

        Ok(out)
    }
}

fn parse_ollama_response(json: &Value) -> std::result::Result<Vec<Vec<f32>>, String> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or("invalid Ollama response: missing embeddings array")?;

    embeddings
        .iter()
        .map(|e| {
            e.as_array()
                .ok_or_else(|| "invalid Ollama response: embedding is not an array".to_string())
                .and_then(|values| to_vector(values))
        })
        .collect()
}

fn to_vector(values: &[Value]) -> std::result::Result<Vec<f32>, String> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| format!("non-numeric embedding component: {}", v))
        })
        .collect()
}

/// One vector per input, each of the configured dimension.
fn check_batch(expected: usize, vectors: &[Vec<f32>], dims: usize) -> docchat_core::Result<()> {
    if vectors.len() != expected {
        return Err(CoreError::embedding(format!(
            "expected {} vectors, got {}",
            expected,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(CoreError::embedding(format!(
            "expected {}-dimensional vectors, got {}",
            dims,
            bad.len()
        )));
    }
    Ok(())
}

// ============ Local (fastembed) ============

#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    kind: fastembed::EmbeddingModel,
    /// Loaded on first use, then reused.
    model: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        let kind = config_to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size.max(1),
            kind,
            model: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> docchat_core::Result<Vec<Vec<f32>>> {
        let cell = Arc::clone(&self.model);
        let kind = self.kind.clone();
        let batch_size = self.batch_size;
        let input = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut guard = cell
                .lock()
                .map_err(|_| CoreError::embedding("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(kind).with_show_download_progress(false),
                )
                .map_err(|e| {
                    CoreError::embedding(format!(
                        "failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                *guard = Some(loaded);
            }
            let Some(model) = guard.as_mut() else {
                return Err(CoreError::embedding("local embedding model not loaded"));
            };
            model
                .embed(input, Some(batch_size))
                .map_err(|e| CoreError::embedding(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| CoreError::embedding(format!("local embedding task failed: {}", e)))??;

        check_batch(texts.len(), &vectors, self.dims)?;
        Ok(vectors)
    }
}

#[cfg(any(feature = "local-embeddings", test))]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => 768,
        _ => 384,
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5",
            other
        ),
    }
}
