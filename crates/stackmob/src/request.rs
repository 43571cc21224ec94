//! Prepared requests and raw responses.

use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::Value;
use url::Url;

use crate::operation::Operation;

/// A fully prepared HTTP request.
///
/// Built once per call by the [`Dispatcher`](crate::Dispatcher) and kept
/// across retries and the refresh-then-resubmit path; only the
/// Authorization header is recomputed before each send.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub operation: Operation,
    pub verb: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<String>,
    /// Whether a MAC Authorization header is attached before each send.
    pub sign: bool,
    /// `None` until the first 503; then the remaining retry budget.
    pub retry_count: Option<u32>,
    /// Set once a refresh has been attempted for this request.
    pub attempted_refresh: bool,
}

impl RequestDescriptor {
    pub fn new(operation: Operation, verb: Method, url: Url) -> Self {
        Self {
            operation,
            verb,
            url,
            headers: HeaderMap::new(),
            body: None,
            sign: true,
            retry_count: None,
            attempted_refresh: false,
        }
    }

    /// Path plus query string, the form the MAC signs.
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }
}

/// A response as it came off the wire.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<String>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Parse the body as JSON. Empty or non-JSON bodies yield `None`.
    pub fn json(&self) -> Option<Value> {
        if self.body.trim().is_empty() {
            return None;
        }
        serde_json::from_str(&self.body).ok()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A successful response handed back to the caller.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// The parsed body, `None` when the body was empty or not JSON.
    pub body: Option<Value>,
}

impl From<RawResponse> for ApiResponse {
    fn from(raw: RawResponse) -> Self {
        let body = raw.json();
        Self {
            status: raw.status,
            headers: raw.headers,
            body,
        }
    }
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The body, or JSON `null` when there was none.
    pub fn into_value(self) -> Value {
        self.body.unwrap_or(Value::Null)
    }
}
