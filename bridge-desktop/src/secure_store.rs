//! Credential storage backed by files in a private directory

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::SecureStore,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed secure storage implementation
///
/// Each key is stored as `<directory>/<key>.json`. Writes go to a temporary
/// sibling first and are renamed into place so a crash mid-write never leaves
/// a truncated credential file. On Unix the file is restricted to the owner.
pub struct FileSecureStore {
    directory: PathBuf,
}

impl FileSecureStore {
    /// Create a store rooted at `directory` (created on first write)
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Platform data directory for this service, e.g.
    /// `~/.local/share/jobfolder-sync` on Linux
    pub fn default_directory() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobfolder-sync")
    }

    /// Root directory holding the credential files
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.directory.join(format!("{}.json", file_name))
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        BridgeError::OperationFailed(format!("{}: {}", path.display(), e))
    }

    #[cfg(unix)]
    async fn restrict_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| Self::map_io_error(path, e))
    }

    #[cfg(not(unix))]
    async fn restrict_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| Self::map_io_error(&self.directory, e))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, value)
            .await
            .map_err(|e| Self::map_io_error(&tmp_path, e))?;
        Self::restrict_permissions(&tmp_path).await?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| Self::map_io_error(&path, e))?;

        debug!(key = key, "Stored secret on disk");
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);

        match tokio::fs::read(&path).await {
            Ok(data) => {
                debug!(key = key, "Retrieved secret from disk");
                Ok(Some(data))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read secret file");
                Err(Self::map_io_error(&path, e))
            }
        }
    }

    async fn delete_secret(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = key, "Deleted secret from disk");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(&path, e)),
        }
    }
}
