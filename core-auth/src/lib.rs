//! # Authentication Module
//!
//! Credential lifecycle for the tracking-system API.
//!
//! ## Features
//!
//! - OAuth 2.0 authorization-code login with PKCE, for seeding the credential
//! - `refresh_token` grant with retry on server errors
//! - Refresh 60 seconds ahead of expiry, serialized so a refresh token is
//!   never spent twice
//! - Credential persisted through the `SecureStore` bridge
//! - Auth events published on the runtime event bus

pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::{AccessTokenProvider, TokenManager, TOKEN_REFRESH_MARGIN};
pub use oauth::{OAuthConfig, OAuthFlowManager, PkceVerifier, DEFAULT_SCOPES};
pub use token_store::{TokenStore, PENDING_AUTHORIZATION_KEY};
pub use types::OAuthTokens;
