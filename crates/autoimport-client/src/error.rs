//! Error types for backend HTTP calls.

use autoimport_core::AutoImportError;
use serde::Deserialize;

/// Errors from a single backend call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {status}: {}", .message.as_deref().unwrap_or("no error payload"))]
    Status { status: u16, message: Option<String> },
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ClientError {
    /// The text a user should see for this failure: the backend's own error
    /// text when it sent one, otherwise `HTTP <status>` or the transport message.
    pub fn service_message(&self) -> String {
        match self {
            ClientError::Status {
                message: Some(message),
                ..
            } => message.clone(),
            ClientError::Status {
                status,
                message: None,
            } => format!("HTTP {}", status),
            other => other.to_string(),
        }
    }

    /// Whether the backend could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_connect())
    }

    /// Whether the transport itself gave up waiting.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Transport(e) if e.is_timeout())
    }

    /// HTTP status of a non-success response, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ClientError> for AutoImportError {
    fn from(err: ClientError) -> Self {
        AutoImportError::Backend(err.to_string())
    }
}

/// Error body shapes the backend produces.
///
/// Service failures carry `{"error": "..."}`; framework-level failures carry
/// `{"detail": "..."}` (or a validation list under `detail`).
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

impl ErrorPayload {
    /// Parse an error body; `None` if it is absent or not one of the known shapes.
    pub(crate) fn message_from(body: &str) -> Option<String> {
        let payload: ErrorPayload = serde_json::from_str(body).ok()?;
        if let Some(error) = payload.error.filter(|e| !e.trim().is_empty()) {
            return Some(error);
        }
        match payload.detail {
            Some(serde_json::Value::String(detail)) if !detail.trim().is_empty() => Some(detail),
            _ => None,
        }
    }
}
