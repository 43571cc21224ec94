//! Session lifecycle over a credential store.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::Result;
use crate::error::{AuthError, StorageError};
use crate::store::{CredentialStore, keys, namespaced};

use super::credentials::SchemaInfo;
use super::oauth::{Credentials, SessionState, TokenResponse};
use super::tokens::{AccessToken, MacKey, RefreshToken};

/// Owns the stored OAuth 2.0 credentials and answers questions about them.
///
/// All checks here are local: nothing in this type talks to the network.
/// The refresh exchange itself is sent by the
/// [`Dispatcher`](crate::Dispatcher), which feeds the response back through
/// [`SessionManager::save_response`].
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    oauth_mode: bool,
}

impl SessionManager {
    pub fn new(store: Arc<dyn CredentialStore>, oauth_mode: bool) -> Self {
        Self { store, oauth_mode }
    }

    pub fn is_oauth_mode(&self) -> bool {
        self.oauth_mode
    }

    fn get(&self, key: &str) -> Option<String> {
        self.store.retrieve(&namespaced(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store.persist(&namespaced(key), value)
    }

    fn unset(&self, key: &str) -> Result<()> {
        self.store.remove(&namespaced(key))
    }

    /// Store a token exchange response received now.
    ///
    /// The login value comes from the returned user object; a refresh
    /// response without one keeps the previously stored user.
    ///
    /// # Errors
    ///
    /// Returns an error if no login value can be determined, the lifetime
    /// is out of range or the store fails.
    pub fn save_response(
        &self,
        response: &TokenResponse,
        schema_info: SchemaInfo,
    ) -> Result<Credentials> {
        let user = response
            .login_value(&schema_info.login_field)
            .or_else(|| self.get(keys::USER))
            .ok_or_else(|| AuthError::InvalidTokenResponse {
                reason: format!(
                    "user object has no '{}' field",
                    schema_info.login_field
                ),
            })?;

        let credentials = Credentials::from_response(response, user, schema_info, Utc::now())?;
        self.save(&credentials)?;
        Ok(credentials)
    }

    /// Overwrite every stored credential key.
    pub fn save(&self, credentials: &Credentials) -> Result<()> {
        let schema_json =
            serde_json::to_string(&credentials.schema_info).map_err(|e| {
                StorageError::Serialization {
                    message: e.to_string(),
                }
            })?;

        self.set(keys::ACCESS_TOKEN, credentials.access_token.as_str())?;
        self.set(keys::MAC_KEY, credentials.mac_key.as_str())?;
        self.set(
            keys::EXPIRES,
            &credentials.expires_at.timestamp_millis().to_string(),
        )?;
        self.set(keys::USER, &credentials.user)?;
        self.set(keys::SCHEMA_INFO, &schema_json)?;
        match &credentials.refresh_token {
            Some(token) => self.set(keys::REFRESH_TOKEN, token.as_str())?,
            None => self.unset(keys::REFRESH_TOKEN)?,
        }

        debug!(user = %credentials.user, expires_at = %credentials.expires_at, "Saved credentials");
        Ok(())
    }

    /// Load the stored credentials.
    ///
    /// Returns `None` unless an access token, MAC key and expiry are all
    /// present.
    pub fn credentials(&self) -> Option<Credentials> {
        let access_token = self.get(keys::ACCESS_TOKEN)?;
        let mac_key = self.get(keys::MAC_KEY)?;
        let expires_at = self.expires_at()?;

        Some(Credentials {
            access_token: AccessToken::new(access_token),
            refresh_token: self.refresh_token(),
            mac_key: MacKey::new(mac_key),
            expires_at,
            user: self.get(keys::USER).unwrap_or_default(),
            schema_info: self.schema_info().unwrap_or_default(),
        })
    }

    /// When the stored access token expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let millis = self.get(keys::EXPIRES)?.parse::<i64>().ok()?;
        DateTime::from_timestamp_millis(millis)
    }

    /// Schema info saved with the last login.
    pub fn schema_info(&self) -> Option<SchemaInfo> {
        let json = self.get(keys::SCHEMA_INFO)?;
        match serde_json::from_str(&json) {
            Ok(info) => Some(info),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable stored schema info");
                None
            }
        }
    }

    pub fn refresh_token(&self) -> Option<RefreshToken> {
        self.get(keys::REFRESH_TOKEN)
            .filter(|t| !t.is_empty())
            .map(RefreshToken::new)
    }

    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token().is_some()
    }

    /// True when there is no expiry on record or it has passed.
    pub fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    pub fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_none_or(|expires| expires <= now)
    }

    /// Remember whether an expired session may be refreshed automatically.
    pub fn set_keep_logged_in(&self, keep: bool) -> Result<()> {
        self.set(keys::KEEP_LOGGED_IN, if keep { "true" } else { "false" })
    }

    pub fn keep_logged_in(&self) -> bool {
        self.get(keys::KEEP_LOGGED_IN).as_deref() == Some("true")
    }

    /// Whether the next request must be preceded by a refresh.
    pub fn should_send_refresh_token(&self) -> bool {
        self.oauth_mode && self.has_expired() && self.has_refresh_token() && self.keep_logged_in()
    }

    pub fn state(&self) -> SessionState {
        self.state_at(Utc::now())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if !self.oauth_mode {
            return SessionState::LoggedOut;
        }
        let Some(credentials) = self.credentials() else {
            return SessionState::LoggedOut;
        };

        if !credentials.is_expired_at(now) {
            SessionState::ValidSession
        } else if credentials.refresh_token.is_some() && self.keep_logged_in() {
            SessionState::ExpiredRefreshable
        } else {
            SessionState::ExpiredTerminal
        }
    }

    /// Local credential check: the login value if credentials are present
    /// and unexpired.
    pub fn has_valid_oauth(&self) -> Option<String> {
        match self.state() {
            SessionState::ValidSession => self.get(keys::USER),
            _ => None,
        }
    }

    /// Best-effort check that never touches the network.
    ///
    /// Expired sessions still count while a refresh is possible; the next
    /// request will refresh them.
    pub fn is_logged_in(&self) -> bool {
        self.state().is_logged_in()
    }

    pub fn is_logged_out(&self) -> bool {
        !self.is_logged_in()
    }

    /// Login value of the current user, if logged in.
    pub fn logged_in_user(&self) -> Option<String> {
        if self.is_logged_in() {
            self.get(keys::USER)
        } else {
            None
        }
    }

    pub fn is_user_logged_in(&self, login: &str) -> bool {
        self.logged_in_user().as_deref() == Some(login)
    }

    /// Form parameters for a `refresh_token` grant.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoRefreshToken`] when nothing is stored.
    pub fn refresh_params(&self) -> Result<BTreeMap<String, Value>> {
        let token = self.refresh_token().ok_or(AuthError::NoRefreshToken)?;

        let mut params = BTreeMap::new();
        params.insert("refresh_token".to_string(), Value::from(token.as_str()));
        params.insert("grant_type".to_string(), Value::from("refresh_token"));
        params.insert("token_type".to_string(), Value::from("mac"));
        params.insert("mac_algorithm".to_string(), Value::from("hmac-sha1"));
        Ok(params)
    }

    /// Forget the refresh token after a failed refresh.
    pub fn discard_refresh_token(&self) -> Result<()> {
        info!("Discarding refresh token");
        self.unset(keys::REFRESH_TOKEN)
    }

    /// Remove every stored credential key.
    pub fn clear(&self) -> Result<()> {
        for key in keys::CREDENTIALS {
            self.unset(key)?;
        }
        info!("Cleared stored credentials");
        Ok(())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("oauth_mode", &self.oauth_mode)
            .field("store", &"[REDACTED]")
            .finish()
    }
}
