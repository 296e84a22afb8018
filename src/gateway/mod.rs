//! Signed request gateway for the EC2 Query API.
//!
//! Turns an [`Action`] plus string parameters into an authenticated `GET`
//! request, executes it through a [`Transport`], and hands back the raw body.
//! Nothing at this layer retries: callers decide whether a failure is worth
//! repeating.

mod signer;
mod transport;

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Method, Request};
use url::Url;

use crate::codec::Action;
use crate::error::EbsError;

pub use signer::{RequestSigner, SigV4Signer, UnsignedRequests};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportError, TransportFuture};

/// Protocol version sent with every request.
pub const API_VERSION: &str = "2014-05-01";

/// Endpoint used when the caller does not supply one.
pub const DEFAULT_ENDPOINT: &str = "https://ec2.amazonaws.com";

/// RFC 3986 unreserved characters stay literal; everything else is escaped.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub(crate) fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, QUERY_COMPONENT).to_string()
}

/// Operation parameters keyed by name.
///
/// Keys are unique and kept sorted so the encoded query string is stable,
/// which the signing step relies on.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Adds or replaces a parameter, returning the set for chaining.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    fn encode(&self) -> String {
        self.iter()
            .map(|(key, value)| format!("{}={}", encode_component(key), encode_component(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Future returned by [`SignedRequester::send`].
pub type GatewayFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, EbsError>> + Send + 'a>>;

/// Sends one authenticated action and returns the raw response body.
pub trait SignedRequester: Send + Sync {
    /// Issues `action` with `params`.
    ///
    /// Implementations add the `Action` and `Version` parameters, sign the
    /// request, and map non-success responses to [`EbsError::Remote`].
    fn send(&self, action: Action, params: Params) -> GatewayFuture<'_>;
}

/// Gateway combining a transport, an endpoint, and a signer.
///
/// The configuration is fixed at construction and the gateway keeps no
/// mutable state, so one instance can serve concurrent calls.
#[derive(Clone, Debug)]
pub struct Gateway<T, S> {
    transport: T,
    endpoint: Url,
    signer: S,
}

impl<T, S> Gateway<T, S>
where
    T: Transport,
    S: RequestSigner,
{
    /// Creates a gateway for `endpoint`, falling back to
    /// [`DEFAULT_ENDPOINT`] when it is blank.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::InvalidEndpoint`] when the endpoint is not a valid
    /// absolute URL.
    pub fn new(transport: T, endpoint: &str, signer: S) -> Result<Self, EbsError> {
        let trimmed = endpoint.trim();
        let target = if trimmed.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            trimmed
        };
        let parsed = Url::parse(target).map_err(|err| EbsError::InvalidEndpoint {
            endpoint: target.to_owned(),
            message: err.to_string(),
        })?;
        if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
            return Err(EbsError::InvalidEndpoint {
                endpoint: target.to_owned(),
                message: String::from("endpoint must be an absolute http(s) URL"),
            });
        }
        Ok(Self {
            transport,
            endpoint: parsed,
            signer,
        })
    }

    /// Returns the endpoint requests are sent to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn build_request(&self, action: Action, mut params: Params) -> Request {
        params.insert("Action", action.as_str());
        params.insert("Version", API_VERSION);
        let mut url = self.endpoint.clone();
        url.set_query(Some(&params.encode()));
        Request::new(Method::GET, url)
    }
}

impl<T, S> SignedRequester for Gateway<T, S>
where
    T: Transport,
    S: RequestSigner,
{
    fn send(&self, action: Action, params: Params) -> GatewayFuture<'_> {
        Box::pin(async move {
            let mut request = self.build_request(action, params);
            self.signer.sign(&mut request);

            let response =
                self.transport
                    .execute(request)
                    .await
                    .map_err(|err| EbsError::Transport {
                        action,
                        message: err.message,
                    })?;
            tracing::debug!(%action, status = response.status, "EC2 request completed");

            if response.is_success() {
                return Ok(response.body);
            }

            Err(EbsError::Remote {
                action,
                status: response.status,
                body: String::from_utf8_lossy(&response.body).into_owned(),
            })
        })
    }
}
