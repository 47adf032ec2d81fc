//! Conversation memory: every answered question of a session, oldest first.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One answered question.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

/// Ordered question/answer history of a session.
///
/// Only successful answers are recorded. The whole history is replayed into
/// every prompt, so it grows for as long as the session lives.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Serialize the history for a prompt, one `Human:`/`Assistant:` pair
    /// per turn.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for turn in &self.turns {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str("Human: ");
            out.push_str(&turn.question);
            out.push_str("\nAssistant: ");
            out.push_str(&turn.answer);
        }
        out
    }
}
