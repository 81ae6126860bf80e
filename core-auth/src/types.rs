use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted OAuth 2.0 credential for the tracking system.
///
/// Serialized as the credential file:
/// `{access_token, refresh_token, expires_in, obtained_at}`. Expiry is derived
/// from `obtained_at + expires_in` so the file stays valid across clock-free
/// reloads.
///
/// # Security
///
/// Tokens must never be logged. The `Debug` implementation redacts them.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
/// use chrono::{Duration, TimeZone, Utc};
///
/// let obtained_at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
/// let tokens = OAuthTokens::new("access", Some("refresh".to_string()), 1800, obtained_at);
///
/// assert_eq!(tokens.expires_at(), obtained_at + Duration::seconds(1800));
/// assert!(!tokens.needs_refresh(obtained_at, Duration::seconds(60)));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    #[serde(default)]
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds, as reported by the token endpoint
    pub expires_in: i64,
    /// When the token endpoint issued this pair
    pub obtained_at: DateTime<Utc>,
}

impl OAuthTokens {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in: i64,
        obtained_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_in,
            obtained_at,
        }
    }

    /// When the access token stops being accepted.
    ///
    /// A lifetime too large to represent counts as already expired, which
    /// forces a refresh instead of trusting the token forever.
    pub fn expires_at(&self) -> DateTime<Utc> {
        Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| self.obtained_at.checked_add_signed(lifetime))
            .unwrap_or(self.obtained_at)
    }

    /// `true` when the access token is absent or `now >= expires_at - margin`.
    pub fn needs_refresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        if self.access_token.is_empty() {
            return true;
        }

        match self.expires_at().checked_sub_signed(margin) {
            Some(refresh_at) => now >= refresh_at,
            None => true,
        }
    }

    /// Time remaining until expiry, or `None` if already expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        let expires_at = self.expires_at();
        (now < expires_at).then(|| expires_at - now)
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_needs_refresh_respects_margin() {
        let tokens = OAuthTokens::new("a", Some("r".to_string()), 1800, issued());
        let margin = Duration::seconds(60);

        assert!(!tokens.needs_refresh(issued() + Duration::seconds(1739), margin));
        assert!(tokens.needs_refresh(issued() + Duration::seconds(1740), margin));
        assert!(tokens.needs_refresh(issued() + Duration::seconds(4000), margin));
    }

    #[test]
    fn test_missing_access_token_needs_refresh() {
        let tokens = OAuthTokens::new("", Some("r".to_string()), 1800, issued());
        assert!(tokens.needs_refresh(issued(), Duration::seconds(60)));
    }

    #[test]
    fn test_out_of_range_lifetime_forces_refresh() {
        let margin = Duration::seconds(60);

        for expires_in in [i64::MAX, i64::MIN, i64::MAX / 1000] {
            let tokens = OAuthTokens::new("a", Some("r".to_string()), expires_in, issued());

            assert_eq!(tokens.expires_at(), issued());
            assert!(tokens.needs_refresh(issued(), margin));
            assert_eq!(tokens.time_until_expiry(issued()), None);
        }
    }

    #[test]
    fn test_time_until_expiry() {
        let tokens = OAuthTokens::new("a", None, 100, issued());

        assert_eq!(
            tokens.time_until_expiry(issued() + Duration::seconds(40)),
            Some(Duration::seconds(60))
        );
        assert_eq!(tokens.time_until_expiry(issued() + Duration::seconds(100)), None);
    }

    #[test]
    fn test_credential_file_shape() {
        let tokens = OAuthTokens::new("a", Some("r".to_string()), 1800, issued());
        let json = serde_json::to_value(&tokens).unwrap();

        assert_eq!(json["access_token"], "a");
        assert_eq!(json["refresh_token"], "r");
        assert_eq!(json["expires_in"], 1800);
        assert!(json["obtained_at"].is_string());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens = OAuthTokens::new("secret-access", Some("secret-refresh".to_string()), 1, issued());
        let debug = format!("{:?}", tokens);

        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }
}
