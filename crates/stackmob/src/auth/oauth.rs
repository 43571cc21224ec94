//! OAuth 2.0 MAC credentials and token exchange responses.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

use super::credentials::SchemaInfo;
use super::tokens::{AccessToken, MacKey, RefreshToken};
use crate::error::AuthError;

/// Session credentials obtained from a token exchange.
///
/// `expires_at` is always computed locally when the credentials are saved,
/// from the lifetime the server reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub access_token: AccessToken,
    pub refresh_token: Option<RefreshToken>,
    pub mac_key: MacKey,
    pub expires_at: DateTime<Utc>,
    /// Login value of the authenticated user.
    pub user: String,
    pub schema_info: SchemaInfo,
}

impl Credentials {
    /// Build credentials from a token response received at `now`.
    ///
    /// # Errors
    ///
    /// Fails when `expires_in` does not fit a representable expiry.
    pub fn from_response(
        response: &TokenResponse,
        user: impl Into<String>,
        schema_info: SchemaInfo,
        now: DateTime<Utc>,
    ) -> Result<Self, AuthError> {
        let expires_at = Duration::try_seconds(response.expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::InvalidTokenResponse {
                reason: format!("expires_in {} is out of range", response.expires_in),
            })?;

        Ok(Self {
            access_token: AccessToken::new(&response.access_token),
            refresh_token: response.refresh_token.as_deref().map(RefreshToken::new),
            mac_key: MacKey::new(&response.mac_key),
            expires_at,
            user: user.into(),
            schema_info,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Body of a successful `accessToken` / `refreshToken` exchange.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub mac_key: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub stackmob: Option<TokenPayload>,
}

/// The `stackmob` envelope carrying the authenticated user object.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenPayload {
    #[serde(default)]
    pub user: Map<String, Value>,
}

impl TokenResponse {
    /// The user object returned with the tokens, if any.
    pub fn user(&self) -> Option<&Map<String, Value>> {
        self.stackmob.as_ref().map(|s| &s.user)
    }

    /// Read the login value out of the user object.
    pub fn login_value(&self, login_field: &str) -> Option<String> {
        match self.user()?.get(login_field)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("mac_key", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("stackmob", &self.stackmob)
            .finish()
    }
}

/// Where the stored session stands, derived from the credentials, the
/// clock, the refresh token and the keep-logged-in flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    ValidSession,
    ExpiredRefreshable,
    ExpiredTerminal,
}

impl SessionState {
    /// A session counts as logged in while valid or while a refresh can
    /// still revive it.
    pub fn is_logged_in(&self) -> bool {
        matches!(
            self,
            SessionState::ValidSession | SessionState::ExpiredRefreshable
        )
    }
}
