use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No stored credential; run the authorization flow first")]
    NotAuthenticated,

    #[error("Stored credential has no refresh token")]
    NoRefreshToken,

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Authorization code rejected: {0}")]
    InvalidAuthCode(String),

    #[error("OAuth state mismatch")]
    StateMismatch { expected: String, actual: String },

    #[error("No pending authorization; generate an authorize URL first")]
    NoPendingAuthorization,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Failed to (de)serialize {context}: {source}")]
    SerializationFailed {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether a later attempt may succeed without operator action
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::NetworkError(_)
                | AuthError::OperationTimeout { .. }
                | AuthError::SecureStorageUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
