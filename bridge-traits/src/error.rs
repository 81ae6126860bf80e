use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote resource does not exist (lookup, copy source, listing root).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The write target already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BridgeError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, BridgeError::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
