//! Error taxonomy shared by the gateway, codec, and remote operations.

use thiserror::Error;

use crate::codec::Action;

/// Errors raised while talking to the EC2 Query API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EbsError {
    /// Raised before any request is issued when arguments do not combine.
    #[error("{0}")]
    Validation(String),
    /// Raised when the configured endpoint cannot be parsed as a URL.
    #[error("invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint {
        /// Endpoint as supplied by the caller.
        endpoint: String,
        /// Parser error message.
        message: String,
    },
    /// Raised when the request never produced an HTTP response.
    #[error("{action} request failed: {message}")]
    Transport {
        /// Action being sent.
        action: Action,
        /// Transport error message.
        message: String,
    },
    /// Raised when the service answered with a non-success status code.
    ///
    /// The body is kept verbatim; the service's error schema is not parsed.
    #[error("{action} rejected with status {status}: {body}")]
    Remote {
        /// Action being sent.
        action: Action,
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Raised when a response body does not match the expected structure.
    #[error("failed to decode {action} response: {message}")]
    Decode {
        /// Action whose response was decoded.
        action: Action,
        /// Decoder error message.
        message: String,
    },
    /// Raised when an exactly-one lookup returns nothing.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of resource (volume, snapshot, address).
        resource: &'static str,
        /// Identifier used for the lookup.
        id: String,
    },
    /// Raised when an exactly-one lookup returns more than one item.
    #[error("expected one {resource} for {id}, found {count}")]
    Ambiguous {
        /// Kind of resource (volume, snapshot, address).
        resource: &'static str,
        /// Identifier used for the lookup.
        id: String,
        /// Number of items returned.
        count: usize,
    },
    /// Raised when a polled resource does not converge before the deadline.
    #[error("timed out waiting for {condition} on {resource_id}")]
    Timeout {
        /// Condition being waited on.
        condition: String,
        /// Resource identifier being polled.
        resource_id: String,
    },
    /// Raised when tagging fails after the volume was created.
    ///
    /// The volume exists remotely without its tags; nothing is rolled back.
    #[error("volume {volume_id} was created but tagging failed: {source}")]
    TaggingFailed {
        /// Identifier of the untagged volume.
        volume_id: String,
        /// Error returned by the tagging call.
        #[source]
        source: Box<EbsError>,
    },
}

impl EbsError {
    /// Maps a result-set size onto the exactly-one contract.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::NotFound`] for an empty set and
    /// [`EbsError::Ambiguous`] when more than one item was returned.
    pub(crate) fn exactly_one<T>(
        mut items: Vec<T>,
        resource: &'static str,
        id: &str,
    ) -> Result<T, Self> {
        match items.len() {
            1 => items.pop().ok_or_else(|| Self::NotFound {
                resource,
                id: id.to_owned(),
            }),
            0 => Err(Self::NotFound {
                resource,
                id: id.to_owned(),
            }),
            count => Err(Self::Ambiguous {
                resource,
                id: id.to_owned(),
                count,
            }),
        }
    }
}
