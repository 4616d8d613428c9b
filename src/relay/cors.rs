//! CORS negotiation.
//!
//! Every relayed response, including errors and preflights, carries the
//! same permissive header set built here.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_REQUEST_HEADERS,
};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method};

/// Verbs advertised in `Access-Control-Allow-Methods`.
pub const ALLOWED_METHODS: &str = "GET,HEAD,POST,PUT,PATCH,DELETE,OPTIONS";

const EXPOSED_BY_DEFAULT: &str = "Content-Type, Content-Encoding, Content-Length";

/// Whether the request is a preflight that must be answered locally.
pub fn is_preflight(method: &Method) -> bool {
    method == Method::OPTIONS
}

/// Build the `Access-Control-Expose-Headers` value for the relayed header set.
pub fn expose_headers(extra: &[HeaderName]) -> HeaderValue {
    let mut value = EXPOSED_BY_DEFAULT.to_string();
    for name in extra {
        value.push_str(", ");
        value.push_str(name.as_str());
    }
    // Header names are always valid header values.
    HeaderValue::from_str(&value).unwrap_or(HeaderValue::from_static(EXPOSED_BY_DEFAULT))
}

/// Compute the CORS headers for a response to `request_headers`.
pub fn negotiate(request_headers: &HeaderMap, expose: &HeaderValue) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(4);
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );

    let allow_headers = request_headers
        .get(ACCESS_CONTROL_REQUEST_HEADERS)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or(HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);

    headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, expose.clone());
    headers
}
