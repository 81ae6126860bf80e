use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),
}

impl CoreError {
    /// Whether the process should refuse to start on this error.
    pub fn is_fatal_at_startup(&self) -> bool {
        match self {
            CoreError::Sync(e) => e.is_fatal_at_startup(),
            CoreError::InitializationFailed(_) | CoreError::Config(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
