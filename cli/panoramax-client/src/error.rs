//! Error handling for Panoramax API operations.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of characters of an error response body kept in the
/// formatted error message.
const MAX_FORMATTED_BODY_CHARS: usize = 500;

pub type Result<T, E = PanoramaxError> = std::result::Result<T, E>;

/// Common error type for all client operations.
#[derive(Debug, Error)]
pub enum PanoramaxError {
    /// Bad input detected before any request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// `place` and `bbox` were both set on a search filter.
    #[error("a search filter can not combine 'place' and 'bbox'")]
    ConflictingFilter,

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A lookup by id found no matching feature.
    #[error("no picture found with id '{0}'")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("base url '{0}' must use http or https")]
    UnsupportedScheme(String),

    #[error("base url '{0}' must not carry a query or fragment")]
    UnexpectedQuery(String),

    #[error("invalid {field}: '{id}' is not a valid Panoramax id")]
    InvalidId { field: &'static str, id: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("a view link needs an image id or a location")]
    EmptyViewLink,
}

/// A non-success response from the service.
#[derive(Debug, Error)]
#[error("{}", fmt_http_error(.status, .status_text, .body))]
pub struct HttpError {
    pub status: StatusCode,
    pub status_text: String,
    /// Response body, only kept for authenticated requests.
    pub body: Option<String>,
}

fn fmt_http_error(status: &StatusCode, status_text: &str, body: &Option<String>) -> String {
    let mut message = format!("{}: {status_text}", status.as_u16());
    if let Some(body) = body.as_deref().filter(|body| !body.is_empty()) {
        message.push_str(": ");
        message.extend(body.chars().take(MAX_FORMATTED_BODY_CHARS));
    }
    message
}

/// The exchange with the service did not complete.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
}

/// A response body did not have the expected shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("could not parse response from '{url}'")]
    Json {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not decode map tile {z}/{x}/{y}: {reason}")]
    Tile {
        z: u32,
        x: u32,
        y: u32,
        reason: String,
    },
}
