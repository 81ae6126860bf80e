//! Error types for the WorkflowMax provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowMaxError {
    /// Access token rejected
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Non-success HTTP status
    #[error("WorkflowMax API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// The envelope parsed but reported a failure status
    #[error("WorkflowMax rejected the request: {0}")]
    Rejected(String),

    /// Body is neither a recognised XML nor JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, WorkflowMaxError>;

impl From<WorkflowMaxError> for BridgeError {
    fn from(error: WorkflowMaxError) -> Self {
        match error {
            WorkflowMaxError::BridgeError(e) => e,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}
