//! Error types for the real-time chat core.

use axum::http::StatusCode;
use thiserror::Error;

/// Result type alias for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Main error type for the chat core.
///
/// Validation errors (`NotAuthorized`, `InvariantViolation`, `NotFound`) are
/// detected from in-memory state before any write; `Storage` aborts a
/// transition with the previous state fully intact.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("You are not the group creator")]
    NotAuthorized,

    #[error("{0}")]
    InvariantViolation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(String),
}

impl ChatError {
    /// Create a not found error for chats
    pub fn chat_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "chat",
            id: id.into(),
        }
    }

    /// Create a not found error for users
    pub fn user_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "user",
            id: id.into(),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// HTTP status for the REST surface.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotAuthorized => StatusCode::FORBIDDEN,
            Self::InvariantViolation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rusqlite::Error> for ChatError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
