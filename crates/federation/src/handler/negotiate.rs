//! Content negotiation and protocol response headers.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::clock::{Clock, http_date};
use crate::signature::calculate_digest;
use crate::vocab::{ACTIVITY_JSON, AS_CONTEXT, Object};

const LD_JSON: &str = "application/ld+json";

/// Whether a media type names protocol documents.
fn is_protocol_media_type(value: &str) -> bool {
    value.split(',').any(|candidate| {
        let mut parts = candidate.split(';').map(str::trim);
        match parts.next().map(str::to_ascii_lowercase).as_deref() {
            Some(ACTIVITY_JSON) => true,
            Some(LD_JSON) => parts.any(|param| {
                param
                    .strip_prefix("profile=")
                    .is_some_and(|profile| profile.trim_matches('"').split(' ').any(|p| p == AS_CONTEXT))
            }),
            _ => false,
        }
    })
}

/// Whether a GET asks for protocol documents.
pub fn accepts_protocol(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(is_protocol_media_type)
}

/// Whether a POST carries a protocol document.
pub fn sends_protocol(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_protocol_media_type)
}

/// Response for a non-protocol GET: the value's human-facing page, or 406 when it has none.
pub fn human_page(value: Option<&Object>) -> Response {
    match value.and_then(|v| v.iri("url")) {
        Some(page) => Redirect::to(page.as_str()).into_response(),
        None => StatusCode::NOT_ACCEPTABLE.into_response(),
    }
}

/// A protocol document with `Content-Type`, `Date` and `Digest` set.
pub fn protocol_response<T: Serialize>(status: StatusCode, body: &T, clock: &dyn Clock) -> Response {
    let bytes = match serde_json::to_vec(body) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize response");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let digest = calculate_digest(&bytes);
    let mut response = (status, bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(ACTIVITY_JSON));
    if let Ok(date) = HeaderValue::from_str(&http_date(clock.now())) {
        headers.insert(header::DATE, date);
    }
    if let Ok(digest) = HeaderValue::from_str(&digest) {
        headers.insert("digest", digest);
    }
    response
}
