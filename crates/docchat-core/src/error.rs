//! Error taxonomy shared by every core operation.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised by the indexing and question-answering pipeline.
///
/// Validation errors are raised at the call that violates a contract.
/// External-service errors are carried unchanged to the caller, which
/// decides whether to offer a retry.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad chunking or session settings.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Bad `k`, bad vector dimension, blank question, and similar.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding provider failed or returned an unusable response.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The chat model failed or returned an empty completion.
    #[error("answer generation failed: {0}")]
    AnswerGeneration(String),

    /// A question was asked before any document was indexed.
    #[error("no documents indexed")]
    NoDocumentsIndexed,
}

impl CoreError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::EmbeddingService(message.into())
    }

    pub fn answer_generation(message: impl Into<String>) -> Self {
        Self::AnswerGeneration(message.into())
    }

    /// True for failures of an external service, where retrying the same
    /// request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingService(_) | Self::AnswerGeneration(_))
    }
}
