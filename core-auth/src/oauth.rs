//! OAuth 2.0 Token Endpoint Client with PKCE Support
//!
//! Implements the parts of RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE) the
//! service needs against the tracking system's identity server:
//! - Building the authorization URL for the one-time operator login
//! - Exchanging the returned authorization code for the first token pair
//! - Refreshing the access token with the `refresh_token` grant
//!
//! # Security
//!
//! - Generates cryptographically secure random state and code verifier
//! - Validates the state parameter to prevent CSRF attacks
//! - Never logs sensitive values (tokens, codes, verifiers)

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::Clock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Scopes requested for the tracking-system API. `offline_access` is what
/// makes the identity server issue a refresh token.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email", "workflowmax", "offline_access"];

const MAX_REFRESH_ATTEMPTS: u32 = 3;

const REFRESH_BACKOFF: RetryPolicy = RetryPolicy {
    max_attempts: MAX_REFRESH_ATTEMPTS,
    base_delay: Duration::from_millis(100),
    max_delay: Duration::from_secs(5),
};

/// OAuth 2.0 client configuration.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    /// Redirect URI registered for the operator login
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// PKCE (Proof Key for Code Exchange) verifier.
///
/// Persisted between generating the authorize URL and exchanging the code,
/// which happen in separate invocations of the binary.
///
/// # Security
///
/// The verifier must be kept secret and never transmitted to the authorization
/// server. Only the challenge derived from it is sent during authorization.
#[derive(Clone, Serialize, Deserialize)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generates a 32-byte code verifier and a 16-byte state, both
    /// base64-url-encoded without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: BASE64URL(SHA256(code_verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// OAuth 2.0 flow manager.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            http_client,
            clock,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorization URL with PKCE challenge.
    ///
    /// Returns the URL the operator should visit together with the verifier
    /// that must be kept for [`OAuthFlowManager::exchange_code`].
    #[instrument(skip(self))]
    pub fn build_auth_url(&self) -> Result<(String, PkceVerifier)> {
        let verifier = PkceVerifier::new();
        let challenge = verifier.challenge();

        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::Other(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", verifier.state())
            .append_pair("code_challenge", &challenge)
            .append_pair("code_challenge_method", "S256");

        debug!("Built authorization URL");

        Ok((url.to_string(), verifier))
    }

    /// Exchange an authorization code for the first token pair.
    ///
    /// # Errors
    ///
    /// - [`AuthError::StateMismatch`] if `state` does not match the verifier
    /// - [`AuthError::InvalidAuthCode`] if the token endpoint rejects the code
    /// - [`AuthError::NetworkError`] on transport failure
    #[instrument(skip(self, code, state, verifier))]
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        verifier: &PkceVerifier,
    ) -> Result<OAuthTokens> {
        if state != verifier.state() {
            warn!("OAuth state mismatch on authorization callback");
            return Err(AuthError::StateMismatch {
                expected: verifier.state().to_string(),
                actual: state.to_string(),
            });
        }

        let params = self.with_client(vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", verifier.verifier()),
        ]);

        debug!("Exchanging authorization code for tokens");

        let request = self.token_request(&params)?;
        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))?;

        if !response.is_success() {
            let body = error_body(&response);
            warn!(status = response.status, error = %body, "Authorization code exchange rejected");

            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                response.status, body
            )));
        }

        let token_response = parse_token_response(&response)?;

        info!(
            expires_in = token_response.expires_in,
            "Exchanged authorization code for tokens"
        );

        Ok(OAuthTokens::new(
            token_response.access_token,
            token_response.refresh_token,
            token_response.expires_in,
            self.clock.now(),
        ))
    }

    /// Refresh an access token using a refresh token.
    ///
    /// 4xx responses fail immediately (the refresh token was rejected); 5xx
    /// responses are retried with exponential backoff. If the endpoint does
    /// not rotate the refresh token, the old one is carried over.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let params = self.with_client(vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ]);

        debug!("Refreshing access token");

        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = self.token_request(&params)?;
            let response = self
                .http_client
                .execute_with_retry(request, RetryPolicy::none())
                .await
                .map_err(|e| AuthError::NetworkError(e.to_string()))?;

            if response.is_success() {
                let token_response = parse_token_response(&response)?;

                info!(
                    expires_in = token_response.expires_in,
                    rotated = token_response.refresh_token.is_some(),
                    "Refreshed access token"
                );

                return Ok(OAuthTokens::new(
                    token_response.access_token,
                    token_response
                        .refresh_token
                        .or_else(|| Some(refresh_token.to_string())),
                    token_response.expires_in,
                    self.clock.now(),
                ));
            }

            let status = response.status;
            let body = error_body(&response);

            // A rejected refresh token will not start working on retry
            if response.is_client_error() {
                warn!(status = status, error = %body, "Token refresh rejected");
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, body
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Gave up after {} attempts, last status {}: {}",
                    attempts, status, body
                )));
            }

            let delay = REFRESH_BACKOFF.delay_for(attempts, response.retry_after());
            warn!(
                status = status,
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }

    /// Grant-specific fields plus the client credentials.
    fn with_client<'a>(&'a self, mut params: Vec<(&'a str, &'a str)>) -> Vec<(&'a str, &'a str)> {
        params.push(("client_id", self.config.client_id.as_str()));
        if let Some(client_secret) = &self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }
        params
    }

    fn token_request(&self, params: &[(&str, &str)]) -> Result<HttpRequest> {
        HttpRequest::post(self.config.token_url.clone())
            .accept("application/json")
            .form(&params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))
    }
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
    response
        .json()
        .map_err(|e| AuthError::Other(format!("Failed to parse token response: {}", e)))
}

fn error_body(response: &HttpResponse) -> String {
    response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

/// JSON response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    1800
}
