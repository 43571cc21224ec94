//! Client configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::auth::SchemaInfo;
use crate::error::{Error, InvalidInputError};
use crate::operation::Operation;
use crate::retry::RetryPolicy;

/// Host used when no API domain is configured.
pub const DEFAULT_API_SERVER: &str = "api.stackmob.com";

/// Development API version. Production APIs are 1, 2, 3 and up.
pub const DEFAULT_API_VERSION: u32 = 0;

/// Which requests go over HTTPS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SecurityMode {
    /// Every request uses HTTPS.
    Always,
    /// No request uses HTTPS unless the call itself demands it.
    Never,
    /// Only authentication and other sensitive operations use HTTPS.
    #[default]
    Mixed,
}

impl SecurityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::Always => "ALWAYS",
            SecurityMode::Never => "NEVER",
            SecurityMode::Mixed => "MIXED",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ALWAYS" => Ok(SecurityMode::Always),
            "NEVER" => Ok(SecurityMode::Never),
            "MIXED" => Ok(SecurityMode::Mixed),
            _ => Err(InvalidInputError::SecurityMode {
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// Configuration for a [`Client`](crate::Client).
///
/// With a public key the client runs in OAuth 2.0 mode: logins exchange a
/// password for MAC credentials and every other request is signed. Without
/// one, requests go out in proxy mode and are never signed.
///
/// # Example
///
/// ```
/// use stackmob::{Config, SecurityMode};
///
/// let config = Config::new("public-key")
///     .with_api_version(1)
///     .with_security(SecurityMode::Always)
///     .with_api_domain("api.example.com")
///     .unwrap();
/// assert_eq!(config.api_domain(), "api.example.com/");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    public_key: Option<String>,
    api_version: u32,
    api_domain: String,
    secure: SecurityMode,
    user_schema: SchemaInfo,
    retry: RetryPolicy,
}

impl Config {
    /// Configuration for OAuth 2.0 mode with the application's public key.
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: Some(public_key.into()),
            ..Self::proxy()
        }
    }

    /// Configuration without a public key (proxy mode).
    pub fn proxy() -> Self {
        Self {
            public_key: None,
            api_version: DEFAULT_API_VERSION,
            api_domain: format!("{}/", DEFAULT_API_SERVER),
            secure: SecurityMode::default(),
            user_schema: SchemaInfo::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_api_version(mut self, version: u32) -> Self {
        self.api_version = version;
        self
    }

    /// Point requests at a different domain.
    ///
    /// The domain must not include a URL scheme; the scheme is chosen per
    /// request from the [`SecurityMode`]. A trailing `/` is added if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain is empty or starts with `http`.
    pub fn with_api_domain(mut self, domain: &str) -> Result<Self, Error> {
        if domain.is_empty() {
            return Err(InvalidInputError::ApiDomain {
                value: domain.to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }
        if domain.starts_with("http") {
            return Err(InvalidInputError::ApiDomain {
                value: domain.to_string(),
                reason: "must not include a URL scheme (http/https)".to_string(),
            }
            .into());
        }

        self.api_domain = if domain.ends_with('/') {
            domain.to_string()
        } else {
            format!("{}/", domain)
        };
        Ok(self)
    }

    pub fn with_security(mut self, mode: SecurityMode) -> Self {
        self.secure = mode;
        self
    }

    /// Replace the default user schema (`user` / `username` / `password`).
    pub fn with_user_schema(mut self, schema: SchemaInfo) -> Self {
        self.user_schema = schema;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    /// The API domain, always ending in `/`.
    pub fn api_domain(&self) -> &str {
        &self.api_domain
    }

    pub fn security(&self) -> SecurityMode {
        self.secure
    }

    pub fn user_schema(&self) -> &SchemaInfo {
        &self.user_schema
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// OAuth 2.0 mode is on whenever a public key is configured.
    pub fn is_oauth_mode(&self) -> bool {
        self.public_key.is_some()
    }

    /// Pick the URL scheme for an operation.
    ///
    /// `force_secure` wins over every mode. Under [`SecurityMode::Mixed`],
    /// HTTPS is used for sensitive operations and for user creation.
    pub fn scheme_for(&self, operation: &Operation, force_secure: bool, user_create: bool) -> &'static str {
        let secure = force_secure
            || match self.secure {
                SecurityMode::Always => true,
                SecurityMode::Never => false,
                SecurityMode::Mixed => user_create || operation.is_secure(),
            };
        if secure { "https" } else { "http" }
    }

    /// Base URL for a scheme, e.g. `https://api.stackmob.com/`.
    pub fn base_url(&self, scheme: &str) -> String {
        format!("{}://{}", scheme, self.api_domain)
    }
}
