//! Error types for the stackmob library.
//!
//! Validation problems (bad geo bounds, ambiguous OR predicates, missing
//! schema or id) surface as [`InvalidInputError`] before any request is sent.
//! Everything that happens on the wire surfaces as transport, protocol or
//! authentication errors from the awaited call.

use std::fmt;
use thiserror::Error;

/// The unified error type for stackmob operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (connection, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Authentication errors (missing credentials, failed token exchange).
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-success responses from the service.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors, raised before anything is sent.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Credential storage failures.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The service kept answering 503 until the retry budget ran out.
    #[error("service unavailable after {attempts} retries")]
    RetriesExhausted { attempts: u32 },
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// The HTTP client could not be built.
    #[error("client setup failed: {message}")]
    Setup { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connection {
                message: err.to_string(),
            }
        } else {
            TransportError::Http {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(TransportError::from(err))
    }
}

/// Authentication-related errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The operation needs OAuth 2.0 mode, i.e. a configured public key.
    #[error("a public key is required for this operation")]
    PublicKeyRequired,

    /// No refresh token is stored.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The token exchange answered with something we can't store.
    #[error("invalid token response: {reason}")]
    InvalidTokenResponse { reason: String },
}

/// Protocol-level errors from non-success responses.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Error string from the response body (if present).
    pub error: Option<String>,
    /// Longer description from the response body (if present).
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Build a protocol error from a raw response body.
    ///
    /// The service reports failures as `{"error": "..."}`, sometimes with an
    /// extra `error_description` or `message`. Anything else yields a bare
    /// status.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };
        let message = field("error_description").or_else(|| field("message"));
        Self::new(status, field("error"), message)
    }
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Latitude outside -90..=90.
    #[error("latitude {value} must be between -90 and 90 inclusive")]
    Latitude { value: f64 },

    /// Longitude outside -180..=180.
    #[error("longitude {value} must be between -180 and 180 inclusive")]
    Longitude { value: f64 },

    /// Two values ORed for the same field in one branch.
    #[error("cannot OR two values for field '{field}'; use must_be_one_of instead")]
    AmbiguousOr { field: String },

    /// Expand depth outside 0..=3.
    #[error("expand depth {depth} must be between 0 and 3 inclusive")]
    ExpandDepth { depth: u8 },

    /// Invalid API domain.
    #[error("invalid API domain '{value}': {reason}")]
    ApiDomain { value: String, reason: String },

    /// Invalid security mode name.
    #[error("invalid security mode '{value}': expected ALWAYS, NEVER or MIXED")]
    SecurityMode { value: String },

    /// The call has no schema to build a URL from.
    #[error("a schema name must be specified for '{operation}'")]
    MissingSchema { operation: String },

    /// The call needs an object id but none was given.
    #[error("an object id must be specified for '{operation}'")]
    MissingId { operation: String },

    /// The assembled URL does not parse.
    #[error("invalid URL '{value}': {reason}")]
    Url { value: String, reason: String },

    /// A header name or value is not valid HTTP.
    #[error("invalid header '{name}'")]
    Header { name: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

/// Credential storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// The stored data could not be (de)serialized.
    #[error("serialization failed: {message}")]
    Serialization { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_error_reads_service_body() {
        let err = ProtocolError::from_body(401, r#"{"error":"invalid_grant","error_description":"expired"}"#);
        assert_eq!(err.error.as_deref(), Some("invalid_grant"));
        assert_eq!(err.message.as_deref(), Some("expired"));
        assert_eq!(err.status, 401);
        assert_eq!(err.to_string(), "HTTP 401 [invalid_grant]: expired");
    }

    #[test]
    fn protocol_error_tolerates_garbage_body() {
        let err = ProtocolError::from_body(500, "<html>oops</html>");
        assert!(err.error.is_none());
        assert_eq!(err.to_string(), "HTTP 500");
    }
}
