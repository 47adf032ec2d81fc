//! Conversational answering engine.
//!
//! Builds one prompt out of a fixed system instruction, the conversation so
//! far, the retrieved chunks, and the new question; sends it to a
//! [`ChatModel`]; records the turn on success.
//!
//! # Prompt layout
//!
//! ```text
//! <system instruction>
//!
//! Conversation so far:
//! Human: …
//! Assistant: …
//!
//! Context from the documents:
//! <chunk 1 text>
//! ---
//! <chunk 2 text>
//!
//! Question: <question>
//! Answer:
//! ```

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::memory::ConversationMemory;
use crate::models::{Answer, RetrievalResult};

/// Role description placed at the top of every prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant answering questions about \
documents the user has uploaded. Use the context passages from those documents and the \
conversation so far. If the answer is not in the context, say that you could not find it \
in the documents instead of guessing.";

/// Separator placed between retrieved chunks.
pub const CONTEXT_DELIMITER: &str = "\n---\n";

const NO_HISTORY: &str = "(no previous questions)";
const NO_CONTEXT: &str = "(no document context available)";

/// A hosted chat model reached with a single prompt.
///
/// Implementations normalize whatever the provider returns into a plain
/// string and report network errors, non-success statuses, and empty
/// completions as [`CoreError::AnswerGeneration`].
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3-8b-8192"`).
    fn model_name(&self) -> &str;

    /// Send `prompt` and return the completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Assembles the prompt text.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    system: String,
    delimiter: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            system: SYSTEM_INSTRUCTION.to_string(),
            delimiter: CONTEXT_DELIMITER.to_string(),
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    pub fn build(
        &self,
        question: &str,
        retrieval: &RetrievalResult,
        memory: &ConversationMemory,
    ) -> String {
        let history = if memory.is_empty() {
            NO_HISTORY.to_string()
        } else {
            memory.render()
        };

        let context = if retrieval.is_empty() {
            NO_CONTEXT.to_string()
        } else {
            retrieval
                .chunks()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(&self.delimiter)
        };

        format!(
            "{system}\n\nConversation so far:\n{history}\n\nContext from the documents:\n{context}\n\nQuestion: {question}\nAnswer:",
            system = self.system,
            history = history,
            context = context,
            question = question,
        )
    }
}

/// Turns a question plus retrieved context into an [`Answer`].
pub struct AnswerEngine<'a> {
    chat: &'a dyn ChatModel,
    prompts: PromptBuilder,
}

impl<'a> AnswerEngine<'a> {
    pub fn new(chat: &'a dyn ChatModel) -> Self {
        Self {
            chat,
            prompts: PromptBuilder::default(),
        }
    }

    pub fn with_prompts(chat: &'a dyn ChatModel, prompts: PromptBuilder) -> Self {
        Self { chat, prompts }
    }

    /// Answer `question` from `retrieval` and `memory`.
    ///
    /// On success the turn is appended to `memory` and the retrieved chunks
    /// are returned as sources, best match first. On failure `memory` is
    /// left as it was.
    ///
    /// # Errors
    ///
    /// [`CoreError::AnswerGeneration`] if the model call fails or the
    /// completion is blank.
    pub async fn answer(
        &self,
        question: &str,
        retrieval: RetrievalResult,
        memory: &mut ConversationMemory,
    ) -> Result<Answer> {
        let prompt = self.prompts.build(question, &retrieval, memory);

        let completion = self.chat.complete(&prompt).await.map_err(|e| match e {
            CoreError::AnswerGeneration(_) => e,
            other => CoreError::answer_generation(other.to_string()),
        });
        let completion = match completion {
            Ok(text) => text,
            Err(e) => {
                warn!(model = self.chat.model_name(), error = %e, "chat model call failed");
                return Err(e);
            }
        };

        let answer = completion.trim();
        if answer.is_empty() {
            warn!(model = self.chat.model_name(), "chat model returned an empty completion");
            return Err(CoreError::answer_generation("empty completion"));
        }

        memory.push(question, answer);
        info!(
            model = self.chat.model_name(),
            sources = retrieval.len(),
            turns = memory.len(),
            "answered question"
        );

        Ok(Answer {
            answer: answer.to_string(),
            sources: retrieval.hits,
        })
    }
}
