//! Typed failures produced at the transport boundary.
//!
//! Downstream code matches on these instead of probing response shapes.

use serde_json::Value;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClientError {
    /// No response was received (connect failure, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// A non-2xx response that was not recovered by a token refresh.
    #[error("API error ({status})")]
    Http { status: u16, body: Value },

    /// The session could not be kept alive.
    #[error(transparent)]
    Auth(#[from] AuthFailure),

    /// A 2xx response whose body did not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("token refresh failed: {message}")]
    RefreshFailed { status: Option<u16>, message: String },

    /// The task driving the refresh went away before it settled.
    #[error("token refresh was abandoned before it settled")]
    RefreshAborted,
}

impl ClientError {
    pub fn http(status: u16, body: Value) -> Self {
        Self::Http { status, body }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            ClientError::Auth(AuthFailure::RefreshFailed { status, .. }) => *status,
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// Human-readable message for toasts and the session's `error` field.
    ///
    /// Prefers the server's `message` field, then the transport's own text,
    /// then a generic string.
    pub fn message(&self) -> String {
        match self {
            ClientError::Http { status, body } => server_message(body)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Request failed with status code {status}")),
            ClientError::Network(msg) if !msg.trim().is_empty() => msg.clone(),
            ClientError::Network(_) => GENERIC_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// The `message` field of an error body, when non-blank.
pub fn server_message(body: &Value) -> Option<&str> {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
}
