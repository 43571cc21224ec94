//! The application-facing client.

use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::auth::{Credentials, Login, SessionManager, SessionState};
use crate::config::Config;
use crate::dispatcher::{Call, Dispatcher};
use crate::operation::Operation;
use crate::request::ApiResponse;
use crate::schema::Schema;
use crate::store::CredentialStore;
use crate::transport::{HttpTransport, Transport};

/// Parameter carrying the new password when logging in with a temporary one.
pub const NEW_PASSWORD_FIELD: &str = "new_password";

/// Session context for talking to the service.
///
/// Owns the configuration, the credential store and the transport. Cloning
/// is cheap and clones share the same session.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use stackmob::{Client, Config, Login, MemoryStore};
///
/// # async fn example() -> Result<(), stackmob::Error> {
/// let client = Client::with_http(Config::new("public-key"), Arc::new(MemoryStore::new()))?;
/// let user = client.login(&Login::new("alice", "secret"), true).await?;
/// println!("logged in as {}", user["username"]);
/// assert!(client.is_logged_in());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    dispatcher: Dispatcher,
}

impl Client {
    pub fn new(
        config: Config,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let session = SessionManager::new(store, config.is_oauth_mode());
        Self {
            dispatcher: Dispatcher::new(Arc::new(config), session, transport),
        }
    }

    /// Client over the default reqwest transport.
    pub fn with_http(config: Config, store: Arc<dyn CredentialStore>) -> Result<Self> {
        Ok(Self::new(config, store, Arc::new(HttpTransport::new()?)))
    }

    pub fn config(&self) -> &Config {
        self.dispatcher.config()
    }

    pub fn session(&self) -> &SessionManager {
        self.dispatcher.session()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Handle for the objects of one schema.
    pub fn schema(&self, name: impl Into<String>) -> Schema<'_> {
        Schema::new(self, name)
    }

    /// Handle for the configured user schema.
    pub fn users(&self) -> Schema<'_> {
        Schema::users(self)
    }

    /// Send an arbitrary call.
    pub async fn dispatch(&self, call: Call) -> Result<ApiResponse> {
        self.dispatcher.dispatch(call).await
    }

    fn user_call(&self, operation: Operation) -> Call {
        let schema = self.config().user_schema().clone();
        Call::new(operation)
            .schema(schema.schema_name.clone())
            .schema_info(schema)
    }

    /// Log in with a password.
    ///
    /// In OAuth 2.0 mode this exchanges the password for MAC credentials,
    /// stores them and returns the user object. `keep_logged_in` allows
    /// expired credentials to be refreshed automatically later.
    #[instrument(skip(self, login), fields(user = %login.username()))]
    pub async fn login(&self, login: &Login, keep_logged_in: bool) -> Result<Value> {
        self.login_with_params(login, keep_logged_in, BTreeMap::new()).await
    }

    /// Log in with a temporary password and set a new one.
    #[instrument(skip(self, login, new_password), fields(user = %login.username()))]
    pub async fn login_with_temp_and_set_new_password(
        &self,
        login: &Login,
        new_password: &str,
        keep_logged_in: bool,
    ) -> Result<Value> {
        let mut extra = BTreeMap::new();
        extra.insert(NEW_PASSWORD_FIELD.to_string(), Value::from(new_password));
        self.login_with_params(login, keep_logged_in, extra).await
    }

    async fn login_with_params(
        &self,
        login: &Login,
        keep_logged_in: bool,
        extra: BTreeMap<String, Value>,
    ) -> Result<Value> {
        self.session().set_keep_logged_in(keep_logged_in)?;
        let schema = self.config().user_schema().clone();

        if !self.config().is_oauth_mode() {
            let operation = if extra.contains_key(NEW_PASSWORD_FIELD) {
                Operation::LoginWithTempAndSetNewPassword
            } else {
                Operation::Login
            };
            let call = self
                .user_call(operation)
                .param(schema.login_field.clone(), login.username())
                .param(schema.password_field.clone(), login.password())
                .params(extra);
            let response = self.dispatch(call).await?;
            info!("Logged in");
            return Ok(response.into_value());
        }

        let call = self
            .user_call(Operation::AccessToken)
            .param(schema.login_field.clone(), login.username())
            .param(schema.password_field.clone(), login.password())
            .param("token_type", "mac")
            .params(extra);
        let (credentials, user) = self.dispatcher.exchange_token(call).await?;
        info!(user = %credentials.user, expires_at = %credentials.expires_at, "Logged in");
        Ok(user)
    }

    /// Log out on the service and forget the stored credentials.
    ///
    /// Local credentials are cleared even when the request fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let result = self.dispatch(self.user_call(Operation::Logout)).await;
        self.session().clear()?;
        match result {
            Ok(_) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Logout request failed; local credentials cleared");
                Err(e)
            }
        }
    }

    /// Trade the refresh token for new credentials now.
    pub async fn refresh_session(&self) -> Result<Credentials> {
        self.dispatcher.refresh_session().await
    }

    /// Local check: valid credentials, or expired ones that can be
    /// refreshed. Never touches the network.
    pub fn is_logged_in(&self) -> bool {
        self.session().is_logged_in()
    }

    pub fn is_logged_out(&self) -> bool {
        self.session().is_logged_out()
    }

    pub fn logged_in_user(&self) -> Option<String> {
        self.session().logged_in_user()
    }

    pub fn is_user_logged_in(&self, login: &str) -> bool {
        self.session().is_user_logged_in(login)
    }

    /// Login value when credentials are present and unexpired.
    pub fn has_valid_oauth(&self) -> Option<String> {
        self.session().has_valid_oauth()
    }

    /// Check the session, refreshing expired credentials if allowed.
    ///
    /// Returns the logged-in user's login value, or `None` when there is no
    /// usable session. A failed refresh yields `None`.
    #[instrument(skip(self))]
    pub async fn validate_session(&self) -> Result<Option<String>> {
        match self.session().state() {
            SessionState::ValidSession => Ok(self.session().has_valid_oauth()),
            SessionState::ExpiredRefreshable => match self.refresh_session().await {
                Ok(credentials) => Ok(Some(credentials.user)),
                Err(e) => {
                    debug!(error = %e, "Session could not be revived");
                    Ok(None)
                }
            },
            SessionState::LoggedOut | SessionState::ExpiredTerminal => Ok(None),
        }
    }

    /// Create a user. Sent over HTTPS in mixed mode and never signed.
    pub async fn create_user(&self, user: Value) -> Result<Value> {
        self.users().create(user).await
    }

    /// Ask the service to email a temporary password.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, login: &str) -> Result<()> {
        let field = self.config().user_schema().login_field.clone();
        let call = self.user_call(Operation::ForgotPassword).param(field, login);
        self.dispatch(call).await?;
        Ok(())
    }

    /// Change the logged-in user's password.
    #[instrument(skip(self, old_password, new_password))]
    pub async fn reset_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let call = self
            .user_call(Operation::ResetPassword)
            .param("old", serde_json::json!({ "password": old_password }))
            .param("new", serde_json::json!({ "password": new_password }));
        self.dispatch(call).await?;
        Ok(())
    }

    /// Log in with a Facebook access token.
    ///
    /// With `create_as`, a user with that login value is created if none is
    /// linked to the Facebook account yet.
    #[instrument(skip(self, facebook_token))]
    pub async fn login_with_facebook(
        &self,
        facebook_token: &str,
        keep_logged_in: bool,
        create_as: Option<&str>,
    ) -> Result<Value> {
        self.session().set_keep_logged_in(keep_logged_in)?;
        let mut call = match create_as {
            Some(login) => {
                let field = self.config().user_schema().login_field.clone();
                self.user_call(Operation::FacebookAccessTokenWithCreate)
                    .param(field, login)
            }
            None => self.user_call(Operation::FacebookAccessToken),
        };
        call = call.param("fb_at", facebook_token).param("token_type", "mac");
        let (_, user) = self.dispatcher.exchange_token(call).await?;
        Ok(user)
    }

    /// Create a user tied to a Facebook account.
    pub async fn create_user_with_facebook(&self, facebook_token: &str, login: &str) -> Result<Value> {
        let field = self.config().user_schema().login_field.clone();
        let call = self
            .user_call(Operation::CreateUserWithFacebook)
            .param("fb_at", facebook_token)
            .param("token_type", "mac")
            .param(field, login);
        Ok(self.dispatch(call).await?.into_value())
    }

    /// Link the logged-in user to a Facebook account.
    pub async fn link_user_with_facebook(&self, facebook_token: &str) -> Result<Value> {
        let call = self
            .user_call(Operation::LinkUserWithFacebook)
            .param("fb_at", facebook_token)
            .param("token_type", "mac");
        Ok(self.dispatch(call).await?.into_value())
    }

    pub async fn unlink_user_from_facebook(&self) -> Result<()> {
        self.dispatch(self.user_call(Operation::UnlinkUserFromFacebook))
            .await?;
        Ok(())
    }

    fn gigya_call(&self, operation: Operation, uid: &str, timestamp: &str, signature: &str) -> Call {
        self.user_call(operation)
            .param("gigya_uid", uid)
            .param("gigya_ts", timestamp)
            .param("gigya_sig", signature)
            .param("token_type", "mac")
    }

    /// Log in with a Gigya identity.
    #[instrument(skip(self, signature))]
    pub async fn login_with_gigya(
        &self,
        uid: &str,
        timestamp: &str,
        signature: &str,
        keep_logged_in: bool,
    ) -> Result<Value> {
        self.session().set_keep_logged_in(keep_logged_in)?;
        let call = self.gigya_call(Operation::GigyaAccessToken, uid, timestamp, signature);
        let (_, user) = self.dispatcher.exchange_token(call).await?;
        Ok(user)
    }

    pub async fn link_user_with_gigya(&self, uid: &str, timestamp: &str, signature: &str) -> Result<Value> {
        let call = self.gigya_call(Operation::LinkUserWithGigya, uid, timestamp, signature);
        Ok(self.dispatch(call).await?.into_value())
    }

    pub async fn unlink_user_from_gigya(&self) -> Result<()> {
        self.dispatch(self.user_call(Operation::UnlinkUserFromGigya))
            .await?;
        Ok(())
    }

    /// Call a custom code method.
    ///
    /// Only GET, POST, PUT and DELETE are accepted; anything else falls back
    /// to GET. Non-GET calls send `params` as a JSON body.
    #[instrument(skip(self, params))]
    pub async fn custom_code(
        &self,
        method: &str,
        params: BTreeMap<String, Value>,
        verb: Option<Method>,
    ) -> Result<ApiResponse> {
        let verb = match verb {
            Some(v) if [Method::GET, Method::POST, Method::PUT, Method::DELETE].contains(&v) => v,
            _ => Method::GET,
        };
        let call = Call::new(Operation::Custom(method.to_string()))
            .verb(verb)
            .params(params);
        self.dispatch(call).await
    }
}
