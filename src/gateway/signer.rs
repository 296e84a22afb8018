//! Request signing capability applied right before dispatch.
//!
//! The gateway never hard-wires an algorithm: it calls
//! [`RequestSigner::sign`] on every outbound request and lets the injected
//! implementation annotate it in place.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Request;
use reqwest::header::{HeaderName, HeaderValue};
use sha2::{Digest, Sha256};

use super::encode_component;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "ec2";
const EMPTY_PAYLOAD_HASH: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Annotates an outbound request with authentication data.
pub trait RequestSigner: Send + Sync {
    /// Signs the request in place, typically by adding headers.
    fn sign(&self, request: &mut Request);
}

impl<F> RequestSigner for F
where
    F: Fn(&mut Request) + Send + Sync,
{
    fn sign(&self, request: &mut Request) {
        self(request);
    }
}

/// Pass-through signer for tests and unauthenticated endpoints.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UnsignedRequests;

impl RequestSigner for UnsignedRequests {
    fn sign(&self, _request: &mut Request) {}
}

/// AWS Signature Version 4 for EC2 Query API `GET` requests.
#[derive(Clone, Eq, PartialEq)]
pub struct SigV4Signer {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
    region: String,
}

impl std::fmt::Debug for SigV4Signer {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SigV4Signer")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl SigV4Signer {
    /// Creates a signer for the given credentials and region.
    #[must_use]
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
            region: region.into(),
        }
    }

    /// Adds a session token for temporary credentials.
    #[must_use]
    pub fn session_token(mut self, token: Option<String>) -> Self {
        self.session_token = token.filter(|value| !value.trim().is_empty());
        self
    }

    /// Signs the request as if sent at `timestamp`.
    pub fn sign_at(&self, request: &mut Request, timestamp: DateTime<Utc>) {
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = timestamp.format("%Y%m%d").to_string();

        let mut headers = BTreeMap::new();
        headers.insert("host", host_header(request.url()));
        headers.insert("x-amz-date", amz_date.clone());
        if let Some(token) = &self.session_token {
            headers.insert("x-amz-security-token", token.clone());
        }

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{}\n", value.trim()))
            .collect();
        let signed_headers = headers.keys().copied().collect::<Vec<_>>().join(";");
        let path = match request.url().path() {
            "" => "/",
            path => path,
        };
        let canonical_request = format!(
            "{}\n{path}\n{}\n{canonical_headers}\n{signed_headers}\n{EMPTY_PAYLOAD_HASH}",
            request.method().as_str(),
            canonical_query(request.url()),
        );

        let scope = format!("{date_stamp}/{}/{SERVICE}/aws4_request", self.region);
        let string_to_sign = format!(
            "{ALGORITHM}\n{amz_date}\n{scope}\n{}",
            hex::encode(Sha256::digest(canonical_request.as_bytes()))
        );
        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date_stamp),
            string_to_sign.as_bytes(),
        ));
        let authorization = format!(
            "{ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
            self.access_key_id
        );

        for (name, value) in headers
            .into_iter()
            .filter(|(name, _)| *name != "host")
            .chain([("authorization", authorization)])
        {
            match HeaderValue::from_str(&value) {
                Ok(header) => {
                    request
                        .headers_mut()
                        .insert(HeaderName::from_static(name), header);
                }
                Err(err) => tracing::warn!(header = name, %err, "skipping unencodable signature header"),
            }
        }
    }

    fn signing_key(&self, date_stamp: &str) -> Vec<u8> {
        let secret = format!("AWS4{}", self.secret_access_key);
        let date_key = hmac_sha256(secret.as_bytes(), date_stamp.as_bytes());
        let region_key = hmac_sha256(&date_key, self.region.as_bytes());
        let service_key = hmac_sha256(&region_key, SERVICE.as_bytes());
        hmac_sha256(&service_key, b"aws4_request")
    }
}

impl RequestSigner for SigV4Signer {
    fn sign(&self, request: &mut Request) {
        self.sign_at(request, Utc::now());
    }
}

fn host_header(url: &url::Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    }
}

fn canonical_query(url: &url::Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (encode_component(&key), encode_component(&value)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(err) => {
            tracing::warn!(%err, "HMAC key rejected; request signature will be invalid");
            return Vec::new();
        }
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
