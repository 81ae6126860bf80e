//! Credential Persistence
//!
//! Stores the tracking-system token pair, and the PKCE verifier of an
//! in-progress operator login, through the [`SecureStore`] bridge. On desktop
//! that is a JSON file in the service's data directory.
//!
//! Token values are never logged or included in error messages.

use crate::error::{AuthError, Result};
use crate::oauth::PkceVerifier;
use crate::types::OAuthTokens;
use bridge_traits::storage::SecureStore;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key of the credential file
pub const CREDENTIALS_KEY: &str = "tokens";

/// Key of the verifier saved between `authorize-url` and `exchange-code`
pub const PENDING_AUTHORIZATION_KEY: &str = "pending_authorization";

#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        Self { secure_store }
    }

    /// Load the persisted credential, `None` if the file does not exist.
    ///
    /// A file that exists but cannot be parsed is an error rather than a
    /// silent `None`, so a damaged refresh token is noticed instead of
    /// being overwritten.
    pub async fn load(&self) -> Result<Option<OAuthTokens>> {
        let tokens: Option<OAuthTokens> = self.read_json(CREDENTIALS_KEY, "credential file").await?;

        if let Some(tokens) = &tokens {
            debug!(
                expires_at = %tokens.expires_at(),
                has_refresh_token = tokens.refresh_token.is_some(),
                "Loaded stored credential"
            );
        }

        Ok(tokens)
    }

    /// Replace the persisted credential.
    pub async fn save(&self, tokens: &OAuthTokens) -> Result<()> {
        self.write_json(CREDENTIALS_KEY, tokens, "credential file").await?;

        info!(
            expires_at = %tokens.expires_at(),
            has_refresh_token = tokens.refresh_token.is_some(),
            "Credential stored"
        );
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        self.secure_store
            .delete_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }

    pub async fn save_pending(&self, verifier: &PkceVerifier) -> Result<()> {
        self.write_json(PENDING_AUTHORIZATION_KEY, verifier, "pending authorization")
            .await
    }

    /// Remove and return the pending verifier.
    pub async fn take_pending(&self) -> Result<Option<PkceVerifier>> {
        let verifier: Option<PkceVerifier> = self
            .read_json(PENDING_AUTHORIZATION_KEY, "pending authorization")
            .await?;

        if verifier.is_some() {
            self.secure_store
                .delete_secret(PENDING_AUTHORIZATION_KEY)
                .await
                .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))?;
        }

        Ok(verifier)
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str, context: &str) -> Result<Option<T>> {
        let data = self.secure_store.get_secret(key).await.map_err(|e| {
            warn!(key = key, error = %e, "Failed to read from secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })?;

        let Some(data) = data else {
            return Ok(None);
        };

        serde_json::from_slice(&data)
            .map(Some)
            .map_err(|source| {
                warn!(key = key, "Stored value is not valid JSON");
                AuthError::SerializationFailed {
                    context: context.to_string(),
                    source,
                }
            })
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T, context: &str) -> Result<()> {
        let json = serde_json::to_vec_pretty(value).map_err(|source| {
            AuthError::SerializationFailed {
                context: context.to_string(),
                source,
            }
        })?;

        self.secure_store.set_secret(key, &json).await.map_err(|e| {
            warn!(key = key, error = %e, "Failed to write to secure storage");
            AuthError::SecureStorageUnavailable(e.to_string())
        })
    }
}
