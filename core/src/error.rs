//! Error types for the todos API client.
//!
//! # Design
//! `ApiError` is the closed taxonomy every operation reports. `Unauthorized`
//! gets its own variant because callers route 401s to a login flow; every
//! other non-2xx status lands in `BadStatus` with the raw code. A 2xx response
//! without a usable payload is `NoContent`, not an empty success.
//!
//! `TransportError` is what a `Transport` returns when no HTTP response was
//! obtained at all; it converts into `ApiError` at the operation boundary.

use thiserror::Error;

/// Errors returned by todos API operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request URL could not be composed.
    #[error("request URL is not allowed")]
    NotAllowedUrl,

    /// The server answered 204, or a 2xx without the expected payload.
    #[error("response has no content")]
    NoContent,

    /// The response body did not match the expected envelope.
    #[error("response body could not be decoded")]
    DecodingError,

    /// The request body could not be serialized.
    #[error("request body could not be encoded")]
    JsonEncodingError,

    /// Non-2xx status other than 401, or a status surfaced by the transport.
    #[error("bad status code {0}")]
    BadStatus(u16),

    /// Anything else, transport failures included.
    #[error("unknown error: {}", .0.as_deref().unwrap_or("no cause"))]
    Unknown(Option<String>),

    /// The server answered 401.
    #[error("unauthorized")]
    Unauthorized,
}

impl ApiError {
    /// User-facing description of the failure.
    pub fn info(&self) -> String {
        match self {
            ApiError::NotAllowedUrl => "The URL is not in a valid format.".to_string(),
            ApiError::NoContent => "There is no data.".to_string(),
            ApiError::DecodingError => "Failed to decode the response.".to_string(),
            ApiError::JsonEncodingError => "The request is not valid JSON.".to_string(),
            ApiError::BadStatus(code) => format!("Unexpected status code {code}."),
            ApiError::Unknown(cause) => {
                format!("An unknown error occurred. {}", cause.as_deref().unwrap_or(""))
                    .trim_end()
                    .to_string()
            }
            ApiError::Unauthorized => "The user is not authorized.".to_string(),
        }
    }
}

/// Failure to obtain any HTTP response from a `Transport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport rejected the request before sending it.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The transport failed with a status code of its own.
    #[error("transport failed with status {0}")]
    Status(u16),

    /// Connection, DNS, TLS or body read failure.
    #[error("transport failed: {0}")]
    Io(String),
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidRequest(_) => ApiError::NotAllowedUrl,
            TransportError::Status(code) => ApiError::BadStatus(code),
            TransportError::Io(cause) => ApiError::Unknown(Some(cause)),
        }
    }
}
