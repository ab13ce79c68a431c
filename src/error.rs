//! Error types for insight fetches
//!
//! Fetch errors are classified by where they happened:
//! - Transport: the request never produced a response (network, timeout)
//! - Server: the endpoint answered with a non-success status
//! - InvalidResponse: the body could not be decoded or normalized
//!
//! Only server errors carry a message that is safe to show verbatim. Every
//! other kind is reported to the user with the widget's fallback message and
//! logged with full detail for diagnostics.

use std::path::PathBuf;
use thiserror::Error;

/// Error types for a single fetch
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    // Transport errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    // Server-reported errors
    #[error("Server returned {status}: {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    // Invalid responses
    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Unexpected response shape: {0}")]
    Normalize(String),
}

impl FetchError {
    /// Returns true if trying again later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout => true,
            FetchError::Server { status, .. } => *status >= 500 || *status == 429,
            FetchError::Decode(_) | FetchError::Normalize(_) => false,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            FetchError::Network(_) | FetchError::Timeout => ErrorType::Transport,
            FetchError::Server { .. } => ErrorType::Server,
            FetchError::Decode(_) | FetchError::Normalize(_) => ErrorType::InvalidResponse,
        }
    }

    /// The message shown to the user.
    ///
    /// A non-blank server-provided message verbatim, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            FetchError::Server {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<NormalizeError> for FetchError {
    fn from(err: NormalizeError) -> Self {
        FetchError::Normalize(err.to_string())
    }
}

/// A raw payload that cannot be mapped onto a widget's schema.
///
/// Missing fields never produce this; only values of the wrong JSON type do.
#[derive(Debug, Clone, Error)]
#[error("{widget} payload rejected: {reason}")]
pub struct NormalizeError {
    pub widget: &'static str,
    pub reason: String,
}

/// Errors while loading configuration or building the HTTP client
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    NoHomeDir,

    #[error("Config file not found at {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

/// Serializable error representation published in `FetchState`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub message: String,
    pub error_type: ErrorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Transport,
    Server,
    InvalidResponse,
}

/// Build the published error for `err`, using `fallback` as the user message
/// whenever the server did not supply one.
pub fn extract_error_info(err: &FetchError, fallback: &str) -> ErrorInfo {
    let status = match err {
        FetchError::Server { status, .. } => Some(*status),
        _ => None,
    };

    ErrorInfo {
        message: err.user_message(fallback),
        error_type: err.error_type(),
        status,
        can_retry: err.is_retryable(),
    }
}
