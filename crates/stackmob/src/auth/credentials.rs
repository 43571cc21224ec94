//! Login credentials and user schema description.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default schema holding user accounts.
pub const DEFAULT_LOGIN_SCHEMA: &str = "user";

/// Default primary key field used to log in.
pub const DEFAULT_LOGIN_FIELD: &str = "username";

/// Default password field.
pub const DEFAULT_PASSWORD_FIELD: &str = "password";

/// Username/password pair for a login request.
///
/// # Security
///
/// The password is never exposed in Debug output to prevent accidental logging.
///
/// # Example
///
/// ```
/// use stackmob::Login;
///
/// let login = Login::new("alice", "hunter2");
/// assert_eq!(login.username(), "alice");
/// ```
#[derive(Clone)]
pub struct Login {
    username: String,
    password: String,
}

impl Login {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the value sent in the schema's login field.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Use this only when constructing authentication requests.
    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Which schema holds users and which of its fields carry the login and
/// password.
///
/// Stored alongside the credentials so a refresh knows where to send the
/// token exchange and which field names the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    pub schema_name: String,
    pub login_field: String,
    pub password_field: String,
}

impl SchemaInfo {
    pub fn new(
        schema_name: impl Into<String>,
        login_field: impl Into<String>,
        password_field: impl Into<String>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            login_field: login_field.into(),
            password_field: password_field.into(),
        }
    }
}

impl Default for SchemaInfo {
    fn default() -> Self {
        Self::new(
            DEFAULT_LOGIN_SCHEMA,
            DEFAULT_LOGIN_FIELD,
            DEFAULT_PASSWORD_FIELD,
        )
    }
}
