//! Error types for the conversation engine.

use autoimport_core::AutoImportError;

/// Errors from the conversation engine.
///
/// Backend failures are not errors at this level: they become turns in the
/// log. These variants cover input the engine refuses and evaluation requests
/// that produced nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
    #[error("evaluation unavailable: {0}")]
    EvaluationUnavailable(String),
    #[error("conversation state poisoned: {0}")]
    StatePoisoned(String),
}

impl From<ChatError> for AutoImportError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::UnknownPreset(_) | ChatError::EvaluationUnavailable(_) => {
                AutoImportError::Simulator(err.to_string())
            }
            other => AutoImportError::Conversation(other.to_string()),
        }
    }
}
