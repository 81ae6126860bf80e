//! Storage Abstractions
//!
//! Provides platform-agnostic traits for secure credential storage and for the
//! team file-storage service that folders are provisioned into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Secure credential storage trait
///
/// Abstracts where credentials live between restarts:
/// - Desktop/server: a JSON file on disk
/// - Tests: an in-memory map
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Never log or expose secret values
/// - Replace the previous value atomically where the platform allows it
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("oauth_token", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value for `key`
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Succeeds if the key is already absent.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}

/// A member of the storage-service team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Opaque member identifier used for the select-user header
    pub member_id: String,
    /// Primary email address
    pub email: String,
    /// Membership status as reported by the service (e.g. "active")
    pub status: String,
}

/// Operating context every storage call is scoped to.
///
/// Resolved once at startup: the namespace comes from configuration and the
/// member from a team listing lookup by email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamContext {
    /// Team namespace that all paths are resolved against
    pub namespace_id: String,
    /// Member whose permissions every call runs under
    pub member_id: String,
}

impl TeamContext {
    pub fn new(namespace_id: impl Into<String>, member_id: impl Into<String>) -> Self {
        Self {
            namespace_id: namespace_id.into(),
            member_id: member_id.into(),
        }
    }

    /// Both halves are required before any storage call is made.
    pub fn is_resolved(&self) -> bool {
        !self.namespace_id.is_empty() && !self.member_id.is_empty()
    }
}

/// Kind of entry returned from a folder listing or metadata lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Folder,
    File,
    Deleted,
}

/// A single entry in the storage namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    /// Last path component, with the casing the service displays
    pub name: String,
    /// Full path relative to the namespace root
    pub path: String,
    /// Entry kind
    pub kind: EntryKind,
}

impl FolderEntry {
    pub fn folder(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind: EntryKind::Folder,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

impl fmt::Display for FolderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)
    }
}

/// Join a parent path and a child name using `/` separators.
///
/// The namespace root is the empty string, so joining onto it yields `/name`.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    format!("{}/{}", parent, name)
}

/// Team file-storage service trait
///
/// Every call is scoped by a [`TeamContext`]. Implementations must classify
/// failures so callers can branch on them:
/// - a missing path (lookup target, copy source, listing root) is
///   [`BridgeError::NotFound`](crate::error::BridgeError::NotFound)
/// - an existing write target is
///   [`BridgeError::Conflict`](crate::error::BridgeError::Conflict)
///
/// Writes never auto-rename.
#[async_trait]
pub trait TeamFolderStore: Send + Sync {
    /// List every member of the team
    async fn list_team_members(&self) -> Result<Vec<TeamMember>>;

    /// Metadata lookup for a single path
    async fn get_metadata(&self, ctx: &TeamContext, path: &str) -> Result<FolderEntry>;

    /// List the immediate children of `path` (`""` is the namespace root)
    async fn list_folder(&self, ctx: &TeamContext, path: &str) -> Result<Vec<FolderEntry>>;

    /// Copy `from` to `to`, including contents
    async fn copy(&self, ctx: &TeamContext, from: &str, to: &str) -> Result<FolderEntry>;

    /// Create an empty folder at `path`
    async fn create_folder(&self, ctx: &TeamContext, path: &str) -> Result<FolderEntry>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "Jobs"), "/Jobs");
        assert_eq!(join_path("/Jobs", "9000549 - ALPHA"), "/Jobs/9000549 - ALPHA");
        assert_eq!(join_path("/Jobs/", "x"), "/Jobs/x");
    }

    #[test]
    fn test_team_context_resolution() {
        assert!(TeamContext::new("ns1", "dbmid:abc").is_resolved());
        assert!(!TeamContext::new("ns1", "").is_resolved());
        assert!(!TeamContext::new("", "dbmid:abc").is_resolved());
    }

    #[test]
    fn test_folder_entry() {
        let entry = FolderEntry::folder("Jobs", "/Jobs");
        assert!(entry.is_folder());
        assert_eq!(entry.to_string(), "/Jobs");
    }
}
