//! Error types for the Dropbox provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DropboxError {
    /// Token rejected or lacking the required team scopes
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Endpoint-specific error; `summary` is the `error_summary` string
    #[error("Dropbox API error (status {status_code}): {summary}")]
    ApiError { status_code: u16, summary: String },

    /// Path lookup failed
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Write target already exists
    #[error("Path conflict: {0}")]
    Conflict(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, DropboxError>;

impl DropboxError {
    /// Classify a `409` error summary such as `path/not_found/..` or
    /// `to/conflict/folder/..`.
    pub fn from_summary(status_code: u16, summary: &str) -> Self {
        let tags: Vec<&str> = summary.split('/').map(str::trim).collect();

        if tags.iter().any(|tag| *tag == "not_found") {
            DropboxError::NotFound(summary.to_string())
        } else if tags.iter().any(|tag| *tag == "conflict") {
            DropboxError::Conflict(summary.to_string())
        } else {
            DropboxError::ApiError {
                status_code,
                summary: summary.to_string(),
            }
        }
    }
}

impl From<DropboxError> for BridgeError {
    fn from(error: DropboxError) -> Self {
        match error {
            DropboxError::NotFound(summary) => BridgeError::NotFound(summary),
            DropboxError::Conflict(summary) => BridgeError::Conflict(summary),
            DropboxError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
