//! Error type for the Rancher API client.

use thiserror::Error;

/// Errors raised while talking to the Rancher API.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("rancher api {operation} failed: {message}")]
    Transport {
        /// Operation being performed.
        operation: &'static str,
        /// Message reported by the HTTP client.
        message: String,
    },
    /// The addressed resource does not exist.
    #[error("rancher api {operation}: {url} not found")]
    NotFound {
        /// Operation being performed.
        operation: &'static str,
        /// URL that returned 404.
        url: String,
    },
    /// Rancher rejected the request.
    #[error("rancher api {operation} returned {status}: {message}")]
    Api {
        /// Operation being performed.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Rancher error code, when the body carried one.
        code: Option<String>,
        /// Rancher error message, or the raw body.
        message: String,
    },
    /// A successful response could not be decoded.
    #[error("rancher api {operation} returned an unreadable body: {message}")]
    Decode {
        /// Operation being performed.
        operation: &'static str,
        /// Decoder error message.
        message: String,
    },
}
