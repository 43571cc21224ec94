//! Transport abstraction and the reqwest-backed implementation.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, trace};

use crate::Result;
use crate::error::TransportError;
use crate::request::{RawResponse, RequestDescriptor};

/// Sends a prepared request and hands back whatever came back.
///
/// Implementations must not interpret the status: 503 retries, token
/// refresh and error mapping all happen in the
/// [`Dispatcher`](crate::Dispatcher).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse>;
}

/// HTTP transport over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with the library user agent.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new() -> Result<Self> {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder =
            reqwest::Client::builder().user_agent(concat!("stackmob-rs/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| TransportError::Setup {
            message: e.to_string(),
        })?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(verb = %request.verb, url = %request.url))]
    async fn send(&self, request: &RequestDescriptor) -> Result<RawResponse> {
        debug!(operation = %request.operation, "Sending request");

        let mut builder = self
            .client
            .request(request.verb.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        trace!(status = %status, bytes = body.len(), "Response received");

        Ok(RawResponse::new(status, headers, body))
    }
}
