//! Chat model clients.
//!
//! Concrete implementations of the core [`ChatModel`] trait:
//! - **[`OpenAICompatibleChat`]**: `POST {base_url}/chat/completions`. The
//!   default base URL is Groq's OpenAI-compatible endpoint.
//! - **[`OllamaChat`]**: `POST {base_url}/api/chat` with streaming off.
//! - **[`DisabledChat`]**: fails every call.
//!
//! Providers do not agree on the shape of a completion. Some return a plain
//! string, some a list of content parts, some an object; every reply goes
//! through [`normalize_completion`] before it reaches the answer engine.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use docchat_core::{ChatModel, CoreError};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::LlmConfig;
use crate::http;

const DEFAULT_OPENAI_COMPATIBLE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Create the chat model named by `config.provider`.
///
/// # Errors
///
/// Fails for an unknown provider, or when the `openai-compatible` provider
/// is selected and the environment variable named by `llm.api_key_env` is
/// not set.
pub fn create_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai-compatible" => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                anyhow::anyhow!("{} environment variable not set", config.api_key_env)
            })?;
            Ok(Arc::new(OpenAICompatibleChat::new(config, api_key)?))
        }
        "ollama" => Ok(Arc::new(OllamaChat::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

/// Reduce a provider's message content to plain text.
///
/// Accepts a string, an array of parts (strings or objects with a `text`
/// field), or an object with a `text` or `content` field. Returns `None`
/// when nothing textual is found.
pub fn normalize_completion(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined: String = parts.iter().filter_map(normalize_completion).collect();
            if joined.is_empty() {
                None
            } else {
                Some(joined)
            }
        }
        Value::Object(map) => map
            .get("text")
            .or_else(|| map.get("content"))
            .and_then(normalize_completion),
        _ => None,
    }
}

fn generation_error(e: http::ServiceError) -> CoreError {
    CoreError::answer_generation(e.to_string())
}

// ============ Disabled ============

pub struct DisabledChat;

#[async_trait]
impl ChatModel for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> docchat_core::Result<String> {
        Err(CoreError::answer_generation("llm provider is disabled"))
    }
}

// ============ OpenAI-compatible (Groq, OpenAI, vLLM, ...) ============

pub struct OpenAICompatibleChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAICompatibleChat {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_COMPATIBLE_URL)
            .trim_end_matches('/');
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/chat/completions", base),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAICompatibleChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> docchat_core::Result<String> {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        let reply = http::post_json(
            &self.client,
            "chat completions",
            &self.url,
            Some(&self.api_key),
            &body,
            0,
        )
        .await
        .map_err(generation_error)?;

        debug!(model = %self.model, "chat completion received");
        normalize_completion(&reply["choices"][0]["message"]["content"])
            .ok_or_else(|| CoreError::answer_generation("response has no completion text"))
    }
}

// ============ Ollama ============

pub struct OllamaChat {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_OLLAMA_URL)
            .trim_end_matches('/');
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: format!("{}/api/chat", base),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> docchat_core::Result<String> {
        let mut options = json!({ "temperature": self.temperature });
        if let Some(max_tokens) = self.max_tokens {
            options["num_predict"] = json!(max_tokens);
        }
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
            "options": options,
        });

        let reply = http::post_json(&self.client, "Ollama", &self.url, None, &body, 0)
            .await
            .map_err(generation_error)?;

        debug!(model = %self.model, "chat completion received");
        normalize_completion(&reply["message"]["content"])
            .ok_or_else(|| CoreError::answer_generation("response has no completion text"))
    }
}
