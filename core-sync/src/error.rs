use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// No valid tracking-system credential; the cycle is abandoned
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Job list call failed or returned an unreadable body
    #[error("Failed to fetch jobs: {0}")]
    Fetch(String),

    #[error("Provisioning {path} failed: {reason}")]
    ProvisionFailed { path: String, reason: String },

    #[error("Destination folders could not be resolved: {0}")]
    FolderResolution(String),

    #[error("Storage team has no members")]
    NoTeamMembers,

    #[error("No storage team member matches the configured email")]
    MemberNotFound,

    /// Preconditions were not met; nothing was fetched
    #[error("Cycle skipped: {0}")]
    CycleSkipped(String),

    #[error("Invalid sibling pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),
}

impl SyncError {
    /// Whether the process should refuse to start on this error
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, SyncError::NoTeamMembers | SyncError::MemberNotFound)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
