//! HTTP transport seam used by the gateway.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::{Client, Request};
use thiserror::Error;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and body of a completed HTTP exchange.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, unparsed.
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Returns true for 2xx status codes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Raised when no HTTP response could be obtained.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{message}")]
pub struct TransportError {
    /// Description of the connectivity failure.
    pub message: String,
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        Self {
            message: value.to_string(),
        }
    }
}

/// Future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + Send + 'a>>;

/// Executes fully built and signed HTTP requests.
pub trait Transport: Send + Sync {
    /// Sends the request and collects the whole response body.
    fn execute(&self, request: Request) -> TransportFuture<'_>;
}

/// Transport backed by a shared [`reqwest::Client`].
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds a client with the default 30 second request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the TLS backend cannot be initialised.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(HTTP_TIMEOUT)
    }

    /// Builds a client that gives up on a request after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the TLS backend cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client, keeping its TLS and timeout settings.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: Request) -> TransportFuture<'_> {
        Box::pin(async move {
            let response = self.client.execute(request).await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok(RawResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}
