//! Response translation.

use axum::http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::Bytes;
use serde_json::Value;

use crate::relay::dispatch::UpstreamResponse;

/// Upstream headers always relayed when present.
pub const RELAYED_HEADERS: [HeaderName; 3] = [CONTENT_TYPE, CONTENT_ENCODING, CONTENT_LENGTH];

/// What the caller receives.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RelayedResponse {
    /// A bodiless response.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A JSON error or status document.
    pub fn json(status: StatusCode, value: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            status,
            headers,
            body: Bytes::from(value.to_string()),
        }
    }
}

/// Copy status, allowlisted headers and raw body from the upstream reply.
///
/// `passthrough` extends the fixed allowlist. Everything else the upstream
/// sent is dropped.
pub fn translate(upstream: UpstreamResponse, passthrough: &[HeaderName]) -> RelayedResponse {
    let mut headers = HeaderMap::new();
    for name in RELAYED_HEADERS.iter().chain(passthrough) {
        for value in upstream.headers.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    RelayedResponse {
        status: upstream.status,
        headers,
        body: upstream.body,
    }
}
