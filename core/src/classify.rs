//! Response classification: status code and body into an envelope or an
//! `ApiError`.
//!
//! # Design
//! The rules run in a fixed order: 204, then the 2xx range (with 401 singled
//! out), then decoding, then the payload checks. A 2xx envelope is only a
//! success when it carries a payload: list envelopes need a non-empty `data`
//! array and single-entity envelopes need `data` present. The single-entity
//! rule applies to every operation alike.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::types::{BaseListResponse, BaseResponse};

/// Map a status code to an error, if it is one.
pub fn check_status(status: u16) -> Result<(), ApiError> {
    match status {
        204 => Err(ApiError::NoContent),
        200..=299 => Ok(()),
        401 => Err(ApiError::Unauthorized),
        other => Err(ApiError::BadStatus(other)),
    }
}

/// Classify a response expected to carry a list envelope.
pub fn classify_list<T: DeserializeOwned>(
    response: &HttpResponse,
) -> Result<BaseListResponse<T>, ApiError> {
    check_status(response.status)?;
    let envelope: BaseListResponse<T> = decode(&response.body)?;
    match envelope.data.as_deref() {
        Some(items) if !items.is_empty() => Ok(envelope),
        _ => Err(ApiError::NoContent),
    }
}

/// Classify a response expected to carry a single-entity envelope.
pub fn classify_entity<T: DeserializeOwned>(
    response: &HttpResponse,
) -> Result<BaseResponse<T>, ApiError> {
    check_status(response.status)?;
    let envelope: BaseResponse<T> = decode(&response.body)?;
    if envelope.data.is_none() {
        return Err(ApiError::NoContent);
    }
    Ok(envelope)
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|e| {
        tracing::debug!(error = %e, "response body did not match envelope");
        ApiError::DecodingError
    })
}
