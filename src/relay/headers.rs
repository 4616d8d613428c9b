//! Outbound header sanitization.
//!
//! Every inbound header is copied except the hop-by-hop set, any header the
//! caller nominated in its own `Connection` header, and `Host`. The outbound
//! client derives `Host` from the target URL, so it always names the target.

use axum::http::header::{CONNECTION, CONTENT_LENGTH, USER_AGENT};
use axum::http::{HeaderMap, HeaderValue};
use bytes::Bytes;

/// Headers that only describe the caller-to-relay leg.
pub const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Case-insensitive membership in [`HOP_BY_HOP`].
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Header names listed in the caller's `Connection` header, lowercased.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Build the outbound header mapping from the caller's headers.
///
/// `default_user_agent` is inserted only when the caller sent none; pass
/// `None` to forward exactly what the caller sent.
pub fn sanitize(inbound: &HeaderMap, default_user_agent: Option<&HeaderValue>) -> HeaderMap {
    let nominated = connection_tokens(inbound);
    let mut outbound = HeaderMap::with_capacity(inbound.len() + 1);

    for (name, value) in inbound {
        let name_str = name.as_str();
        if is_hop_by_hop(name_str) || nominated.iter().any(|t| t == name_str) {
            continue;
        }
        outbound.append(name.clone(), value.clone());
    }

    if let Some(agent) = default_user_agent {
        if !outbound.contains_key(USER_AGENT) {
            outbound.insert(USER_AGENT, agent.clone());
        }
    }

    outbound
}

/// Make `Content-Length` describe the body actually sent.
///
/// Re-serialized payloads can differ in length from what the caller
/// declared, so the caller's value is never trusted.
pub fn frame_body(headers: &mut HeaderMap, body: Option<&Bytes>) {
    match body {
        Some(bytes) => {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        }
        None => {
            headers.remove(CONTENT_LENGTH);
        }
    }
}
