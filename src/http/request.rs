//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for callers that sent none
//! - Extract the target URL from the query string
//! - Hand the body to the relay as an unread stream; the relay enforces
//!   the size cap while draining it
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing, and forwarded
//!   upstream like any other end-to-end header
//! - The first `url` parameter wins; a malformed query string is treated
//!   as a missing target rather than rejected by the framework

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::relay::target::TARGET_PARAM;
use crate::relay::{InboundRequest, Payload, RawBody};

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Issues UUID v4 request IDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Request ID for logging, `"unknown"` if the layer did not run.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// First `url` query parameter, percent-decoded.
pub fn target_param(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_PARAM)
        .map(|(_, value)| value.into_owned())
}

/// Convert an Axum request into the relay's inbound model.
///
/// Axum never pre-parses bodies, so the payload is always absent and the
/// relay drains the stream itself.
pub fn into_inbound(request: Request<Body>) -> InboundRequest {
    let (parts, body) = request.into_parts();
    InboundRequest {
        method: parts.method,
        target: target_param(&parts.uri),
        headers: parts.headers,
        payload: Payload::Absent,
        stream: Some(RawBody::new(body.into_data_stream())),
    }
}
