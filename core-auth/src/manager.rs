//! # Token Manager
//!
//! Owns the lifecycle of the tracking-system credential: hands out a valid
//! access token before every fetch, refreshing and re-persisting it when it is
//! within the safety margin of expiry.
//!
//! ## Refresh rule
//!
//! ```text
//! access token absent, or now >= obtained_at + expires_in - 60s
//!     -> refresh_token grant -> persist new pair -> return new access token
//! otherwise
//!     -> return cached access token
//! ```
//!
//! Refreshes are serialized behind a mutex so two callers never spend the same
//! refresh token twice.

use crate::error::{AuthError, Result};
use crate::oauth::OAuthFlowManager;
use crate::token_store::TokenStore;
use crate::types::OAuthTokens;
use async_trait::async_trait;
use bridge_traits::time::Clock;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument};

/// Refresh this long before the access token actually expires.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Upper bound on a single refresh exchange, retries included.
const REFRESH_TIMEOUT: Duration = Duration::from_secs(60);

/// Source of a currently valid bearer token for the tracking-system API.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Return an access token that is valid for at least the safety margin.
    ///
    /// # Errors
    ///
    /// Fails with an [`AuthError`] if no refresh token is available or the
    /// refresh exchange is rejected.
    async fn access_token(&self) -> Result<String>;
}

pub struct TokenManager {
    token_store: TokenStore,
    oauth: OAuthFlowManager,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        token_store: TokenStore,
        oauth: OAuthFlowManager,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            token_store,
            oauth,
            event_bus,
            clock,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Whether a credential file with a refresh token exists.
    pub async fn has_credentials(&self) -> Result<bool> {
        Ok(self
            .token_store
            .load()
            .await?
            .is_some_and(|tokens| tokens.refresh_token.is_some()))
    }

    /// Return a valid access token, refreshing it first if necessary.
    #[instrument(skip(self))]
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let tokens = self.token_store.load().await?.ok_or_else(|| {
            self.emit_error(&AuthError::NotAuthenticated);
            AuthError::NotAuthenticated
        })?;

        let now = self.clock.now();
        let margin = chrono::Duration::seconds(TOKEN_REFRESH_MARGIN.as_secs() as i64);

        if !tokens.needs_refresh(now, margin) {
            debug!(expires_at = %tokens.expires_at(), "Cached access token is valid");
            return Ok(tokens.access_token);
        }

        info!("Access token missing or expiring, refreshing");
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        let refresh_token = tokens.refresh_token.ok_or_else(|| {
            error!("Stored credential has no refresh token");
            self.emit_error(&AuthError::NoRefreshToken);
            AuthError::NoRefreshToken
        })?;

        let new_tokens = match timeout(
            REFRESH_TIMEOUT,
            self.oauth.refresh_access_token(&refresh_token),
        )
        .await
        {
            Ok(Ok(tokens)) => tokens,
            Ok(Err(e)) => {
                error!(error = %e, "Token refresh failed");
                self.emit_error(&e);
                return Err(e);
            }
            Err(_) => {
                let e = AuthError::OperationTimeout {
                    operation: "token refresh".to_string(),
                };
                error!("Token refresh timed out");
                self.emit_error(&e);
                return Err(e);
            }
        };

        self.token_store.save(&new_tokens).await?;

        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                expires_at: new_tokens.expires_at().timestamp(),
            }));

        info!(expires_at = %new_tokens.expires_at(), "Token refreshed");
        Ok(new_tokens.access_token)
    }

    /// Start an operator login: build the authorize URL and remember its verifier.
    pub async fn begin_authorization(&self) -> Result<String> {
        let (url, verifier) = self.oauth.build_auth_url()?;
        self.token_store.save_pending(&verifier).await?;
        Ok(url)
    }

    /// Finish an operator login started with [`TokenManager::begin_authorization`].
    #[instrument(skip(self, code, state))]
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<OAuthTokens> {
        let verifier = self
            .token_store
            .take_pending()
            .await?
            .ok_or(AuthError::NoPendingAuthorization)?;

        let tokens = self.oauth.exchange_code(code, state, &verifier).await.map_err(|e| {
            self.emit_error(&e);
            e
        })?;

        self.token_store.save(&tokens).await?;

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::Authorized {
            expires_at: tokens.expires_at().timestamp(),
        }));

        Ok(tokens)
    }

    fn emit_error(&self, e: &AuthError) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: e.to_string(),
            recoverable: e.is_recoverable(),
        }));
    }
}

#[async_trait]
impl AccessTokenProvider for TokenManager {
    async fn access_token(&self) -> Result<String> {
        self.get_valid_access_token().await
    }
}
