//! # Service Configuration
//!
//! Typed configuration for the job folder sync service.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `ServiceConfig`. Validation is fail-fast: `build()` reports the first
//! missing or malformed value with the environment variable that supplies it,
//! so a misconfigured deployment stops at startup rather than on the first
//! polling cycle.
//!
//! ## Usage
//!
//! ### From the environment
//!
//! ```ignore
//! use core_runtime::config::ServiceConfig;
//!
//! let config = ServiceConfig::from_env()?;
//! ```
//!
//! ### Login only
//!
//! Seeding the tracking-system credential needs only the WorkflowMax
//! section, so [`AuthorizationConfig`] validates just that part:
//!
//! ```ignore
//! use core_runtime::config::AuthorizationConfig;
//!
//! let config = AuthorizationConfig::from_env()?;
//! ```
//!
//! ### Explicit builder
//!
//! ```
//! use core_runtime::config::ServiceConfig;
//!
//! let config = ServiceConfig::builder()
//!     .workflowmax_client("client-id", "client-secret")
//!     .workflowmax_account_id("account-1")
//!     .dropbox_access_token("sl.team-token")
//!     .dropbox_namespace_id("1234567890")
//!     .member_email("ops@example.com")
//!     .template_path("/Templates/Job Template")
//!     .destination_fragments("Active Jobs", "Subdivision", "Surveys")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.polling.interval.as_secs(), 60);
//! ```

use crate::error::{Error, Result};
use chrono_tz::Tz;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default polling cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Default look-back window opened at process start
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest look-back accepted
pub const MAX_LOOKBACK: Duration = Duration::from_secs(366 * 24 * 60 * 60);

const DEFAULT_WFM_AUTH_URL: &str = "https://oauth.workflowmax2.com/oauth/authorize";
const DEFAULT_WFM_TOKEN_URL: &str = "https://oauth.workflowmax2.com/oauth/token";
const DEFAULT_WFM_API_BASE: &str = "https://api.workflowmax2.com";
const DEFAULT_WFM_REDIRECT_URI: &str = "http://localhost:3000/callback";
const DEFAULT_DROPBOX_API_BASE: &str = "https://api.dropboxapi.com/2";

/// Tracking-system (WorkflowMax) settings.
#[derive(Clone)]
pub struct WorkflowMaxSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Account identifier sent with every API call
    pub account_id: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub api_base_url: String,
    /// Zone the account reports offset-less timestamps and query days in
    pub timezone: Tz,
}

impl fmt::Debug for WorkflowMaxSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowMaxSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("timezone", &self.timezone)
            .finish()
    }
}

/// Storage-service (Dropbox team) settings.
#[derive(Clone)]
pub struct DropboxSettings {
    pub access_token: String,
    /// Team namespace all paths resolve against
    pub namespace_id: String,
    /// Email of the member every call is made as
    pub member_email: String,
    pub api_base_url: String,
}

impl fmt::Debug for DropboxSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DropboxSettings")
            .field("access_token", &"[REDACTED]")
            .field("namespace_id", &self.namespace_id)
            .field("member_email", &self.member_email)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Name fragments identifying the three destination folders at the
/// namespace root. Matching is a case-sensitive substring test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationFragments {
    pub a: String,
    pub b: String,
    pub c: String,
}

/// Folder provisioning settings.
#[derive(Debug, Clone)]
pub struct ProvisioningSettings {
    /// Folder copied as the starting layout of every new job folder
    pub template_path: String,
    pub fragments: DestinationFragments,
}

/// Scheduler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingSettings {
    pub interval: Duration,
    /// How far back the first window reaches at process start
    pub lookback: Duration,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            lookback: DEFAULT_LOOKBACK,
        }
    }
}

/// Complete service configuration.
///
/// Use [`ServiceConfigBuilder`] or [`ServiceConfig::from_env`] to construct.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub workflowmax: WorkflowMaxSettings,
    pub dropbox: DropboxSettings,
    pub provisioning: ProvisioningSettings,
    pub polling: PollingSettings,
    /// Directory holding the credential file; `None` uses the platform default
    pub credentials_dir: Option<PathBuf>,
}

impl ServiceConfig {
    /// Creates a new builder for constructing a `ServiceConfig`.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Load configuration from process environment variables.
    ///
    /// See [`ServiceConfig::from_lookup`] for the variable names.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// | Variable | Required |
    /// |----------|----------|
    /// | `WFM_CLIENT_ID`, `WFM_CLIENT_SECRET`, `WFM_ACCOUNT_ID` | yes |
    /// | `WFM_REDIRECT_URI`, `WFM_AUTH_URL`, `WFM_TOKEN_URL`, `WFM_API_BASE_URL` | no |
    /// | `WFM_TIMEZONE` (IANA name, default `UTC`) | no |
    /// | `DROPBOX_ACCESS_TOKEN`, `DROPBOX_NAMESPACE_ID`, `DROPBOX_MEMBER_EMAIL` | yes |
    /// | `DROPBOX_API_BASE_URL` | no |
    /// | `TEMPLATE_FOLDER_PATH` | yes |
    /// | `DEST_FRAGMENT_A`, `DEST_FRAGMENT_B`, `DEST_FRAGMENT_C` | yes |
    /// | `POLL_INTERVAL_SECS`, `LOOKBACK_HOURS`, `CREDENTIALS_DIR` | no |
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        ServiceConfigBuilder::from_lookup(lookup)?.build()
    }

    /// Validates value ranges that the builder cannot express by type alone.
    pub fn validate(&self) -> Result<()> {
        if self.polling.interval.is_zero() {
            return Err(Error::Config(
                "Polling interval must be greater than zero (POLL_INTERVAL_SECS)".to_string(),
            ));
        }

        if self.polling.lookback.is_zero() {
            return Err(Error::Config(
                "Look-back window must be greater than zero (LOOKBACK_HOURS)".to_string(),
            ));
        }

        if self.polling.lookback > MAX_LOOKBACK {
            return Err(Error::Config(format!(
                "Look-back window must be at most {} hours (LOOKBACK_HOURS)",
                MAX_LOOKBACK.as_secs() / 3600
            )));
        }

        let fragments = &self.provisioning.fragments;
        if fragments.a == fragments.b || fragments.a == fragments.c || fragments.b == fragments.c
        {
            return Err(Error::Config(
                "Destination fragments must be distinct (DEST_FRAGMENT_A/B/C)".to_string(),
            ));
        }

        if !self.dropbox.member_email.contains('@') {
            return Err(Error::Config(
                "Member email is not an email address (DROPBOX_MEMBER_EMAIL)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Settings for the operator login commands.
#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    pub workflowmax: WorkflowMaxSettings,
    /// Directory holding the credential file; `None` uses the platform default
    pub credentials_dir: Option<PathBuf>,
}

impl AuthorizationConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same variables as [`ServiceConfig::from_lookup`]. Only the required
    /// `WFM_*` ones must be set; storage and provisioning settings are
    /// ignored.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let builder = ServiceConfigBuilder::from_lookup(lookup)?;
        Ok(Self {
            workflowmax: builder.workflowmax()?,
            credentials_dir: builder.credentials_dir,
        })
    }
}

/// Builder for constructing [`ServiceConfig`] instances.
#[derive(Default)]
pub struct ServiceConfigBuilder {
    wfm_client_id: Option<String>,
    wfm_client_secret: Option<String>,
    wfm_account_id: Option<String>,
    wfm_redirect_uri: Option<String>,
    wfm_auth_url: Option<String>,
    wfm_token_url: Option<String>,
    wfm_api_base_url: Option<String>,
    wfm_timezone: Option<Tz>,
    dropbox_access_token: Option<String>,
    dropbox_namespace_id: Option<String>,
    member_email: Option<String>,
    dropbox_api_base_url: Option<String>,
    template_path: Option<String>,
    fragment_a: Option<String>,
    fragment_b: Option<String>,
    fragment_c: Option<String>,
    poll_interval: Option<Duration>,
    lookback: Option<Duration>,
    credentials_dir: Option<PathBuf>,
}

impl ServiceConfigBuilder {
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut builder = Self {
            wfm_client_id: get("WFM_CLIENT_ID"),
            wfm_client_secret: get("WFM_CLIENT_SECRET"),
            wfm_account_id: get("WFM_ACCOUNT_ID"),
            wfm_redirect_uri: get("WFM_REDIRECT_URI"),
            wfm_auth_url: get("WFM_AUTH_URL"),
            wfm_token_url: get("WFM_TOKEN_URL"),
            wfm_api_base_url: get("WFM_API_BASE_URL"),
            dropbox_access_token: get("DROPBOX_ACCESS_TOKEN"),
            dropbox_namespace_id: get("DROPBOX_NAMESPACE_ID"),
            member_email: get("DROPBOX_MEMBER_EMAIL"),
            dropbox_api_base_url: get("DROPBOX_API_BASE_URL"),
            template_path: get("TEMPLATE_FOLDER_PATH"),
            fragment_a: get("DEST_FRAGMENT_A"),
            fragment_b: get("DEST_FRAGMENT_B"),
            fragment_c: get("DEST_FRAGMENT_C"),
            credentials_dir: get("CREDENTIALS_DIR").map(PathBuf::from),
            ..Self::default()
        };

        if let Some(raw) = get("WFM_TIMEZONE") {
            let zone: Tz = raw.trim().parse().map_err(|_| {
                Error::Config(format!("WFM_TIMEZONE is not an IANA zone name: {}", raw))
            })?;
            builder.wfm_timezone = Some(zone);
        }

        if let Some(raw) = get("POLL_INTERVAL_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("POLL_INTERVAL_SECS is not a number: {}", raw))
            })?;
            builder.poll_interval = Some(Duration::from_secs(secs));
        }

        if let Some(raw) = get("LOOKBACK_HOURS") {
            let hours: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("LOOKBACK_HOURS is not a number: {}", raw))
            })?;
            let secs = hours.checked_mul(60 * 60).ok_or_else(|| {
                Error::Config(format!("LOOKBACK_HOURS is out of range: {}", raw))
            })?;
            builder.lookback = Some(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    pub fn workflowmax_client(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.wfm_client_id = Some(client_id.into());
        self.wfm_client_secret = Some(client_secret.into());
        self
    }

    pub fn workflowmax_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.wfm_account_id = Some(account_id.into());
        self
    }

    pub fn workflowmax_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.wfm_redirect_uri = Some(uri.into());
        self
    }

    pub fn workflowmax_timezone(mut self, zone: Tz) -> Self {
        self.wfm_timezone = Some(zone);
        self
    }

    /// Override the OAuth and API endpoints (used against staging or a local mock)
    pub fn workflowmax_endpoints(
        mut self,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Self {
        self.wfm_auth_url = Some(auth_url.into());
        self.wfm_token_url = Some(token_url.into());
        self.wfm_api_base_url = Some(api_base_url.into());
        self
    }

    pub fn dropbox_access_token(mut self, token: impl Into<String>) -> Self {
        self.dropbox_access_token = Some(token.into());
        self
    }

    pub fn dropbox_namespace_id(mut self, namespace_id: impl Into<String>) -> Self {
        self.dropbox_namespace_id = Some(namespace_id.into());
        self
    }

    pub fn dropbox_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.dropbox_api_base_url = Some(url.into());
        self
    }

    pub fn member_email(mut self, email: impl Into<String>) -> Self {
        self.member_email = Some(email.into());
        self
    }

    pub fn template_path(mut self, path: impl Into<String>) -> Self {
        self.template_path = Some(path.into());
        self
    }

    pub fn destination_fragments(
        mut self,
        a: impl Into<String>,
        b: impl Into<String>,
        c: impl Into<String>,
    ) -> Self {
        self.fragment_a = Some(a.into());
        self.fragment_b = Some(b.into());
        self.fragment_c = Some(c.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn lookback(mut self, lookback: Duration) -> Self {
        self.lookback = Some(lookback);
        self
    }

    pub fn credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = Some(dir.into());
        self
    }

    fn workflowmax(&self) -> Result<WorkflowMaxSettings> {
        Ok(WorkflowMaxSettings {
            client_id: required(self.wfm_client_id.clone(), "WFM_CLIENT_ID")?,
            client_secret: required(self.wfm_client_secret.clone(), "WFM_CLIENT_SECRET")?,
            account_id: required(self.wfm_account_id.clone(), "WFM_ACCOUNT_ID")?,
            redirect_uri: self
                .wfm_redirect_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_WFM_REDIRECT_URI.to_string()),
            auth_url: self
                .wfm_auth_url
                .clone()
                .unwrap_or_else(|| DEFAULT_WFM_AUTH_URL.to_string()),
            token_url: self
                .wfm_token_url
                .clone()
                .unwrap_or_else(|| DEFAULT_WFM_TOKEN_URL.to_string()),
            api_base_url: self
                .wfm_api_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_WFM_API_BASE.to_string()),
            timezone: self.wfm_timezone.unwrap_or(Tz::UTC),
        })
    }

    /// Builds the configuration, failing on the first missing required value.
    pub fn build(self) -> Result<ServiceConfig> {
        let config = ServiceConfig {
            workflowmax: self.workflowmax()?,
            dropbox: DropboxSettings {
                access_token: required(self.dropbox_access_token, "DROPBOX_ACCESS_TOKEN")?,
                namespace_id: required(self.dropbox_namespace_id, "DROPBOX_NAMESPACE_ID")?,
                member_email: required(self.member_email, "DROPBOX_MEMBER_EMAIL")?,
                api_base_url: self
                    .dropbox_api_base_url
                    .unwrap_or_else(|| DEFAULT_DROPBOX_API_BASE.to_string()),
            },
            provisioning: ProvisioningSettings {
                template_path: required(self.template_path, "TEMPLATE_FOLDER_PATH")?,
                fragments: DestinationFragments {
                    a: required(self.fragment_a, "DEST_FRAGMENT_A")?,
                    b: required(self.fragment_b, "DEST_FRAGMENT_B")?,
                    c: required(self.fragment_c, "DEST_FRAGMENT_C")?,
                },
            },
            polling: PollingSettings {
                interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
                lookback: self.lookback.unwrap_or(DEFAULT_LOOKBACK),
            },
            credentials_dir: self.credentials_dir,
        };

        config.validate()?;
        Ok(config)
    }
}

fn required(value: Option<String>, variable: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("Missing required setting {}", variable)))
}
