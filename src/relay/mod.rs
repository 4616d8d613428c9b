//! The relay: one inbound request in, one response out.
//!
//! # Data Flow
//! ```text
//! InboundRequest
//!     → target.rs   (url param present?)           ─ 400 Missing url param
//!     → cors.rs     (CORS headers; OPTIONS?)        ─ 200 empty
//!     → target.rs   (absolute http(s) URL?)         ─ 400 Invalid url param
//!     → headers.rs  (strip hop-by-hop, default UA)
//!     → body.rs     (payload or drained stream)     ─ 413 Payload too large
//!                                                   ─ 502 Proxy error
//!     → dispatch.rs (send, buffer upstream body)    ─ 502 Proxy error
//!     → response.rs (status, 3 headers, raw bytes)
//!     → RelayedResponse (+ CORS headers)
//! ```
//!
//! # Design Decisions
//! - No state survives an invocation; `Relay` only holds immutable policy
//! - Bodies are opaque bytes end to end and fully buffered
//! - Every failure becomes a JSON response; `handle` cannot fail

pub mod body;
pub mod cors;
pub mod dispatch;
pub mod error;
pub mod headers;
pub mod response;
pub mod target;

use std::time::Instant;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::config::{PolicyConfig, ValidationError};
use crate::observability::metrics;

pub use body::{Payload, RawBody};
pub use dispatch::{DispatchError, HttpUpstream, OutboundRequest, Upstream, UpstreamResponse};
pub use error::RelayError;
pub use response::RelayedResponse;

/// A caller's request as delivered by the hosting runtime.
#[derive(Debug, Default)]
pub struct InboundRequest {
    pub method: Method,
    /// Value of the `url` query parameter.
    pub target: Option<String>,
    pub headers: HeaderMap,
    /// Body the runtime already buffered, if any.
    pub payload: Payload,
    /// Unread body stream, if any.
    pub stream: Option<RawBody>,
}

/// Immutable per-deployment policy, resolved from [`PolicyConfig`].
#[derive(Debug, Clone)]
pub struct RelayPolicy {
    user_agent: Option<HeaderValue>,
    passthrough: Vec<HeaderName>,
    expose: HeaderValue,
    max_body_size: usize,
}

impl RelayPolicy {
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ValidationError> {
        let user_agent = if config.spoof_user_agent {
            let value = HeaderValue::from_str(&config.user_agent)
                .map_err(|_| ValidationError::UserAgent(config.user_agent.clone()))?;
            Some(value)
        } else {
            None
        };

        let passthrough = config
            .passthrough_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| ValidationError::HeaderName(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            user_agent,
            expose: cors::expose_headers(&passthrough),
            passthrough,
            max_body_size: config.max_body_size,
        })
    }
}

enum Processed {
    Preflight,
    Relayed(RelayedResponse),
}

/// Translates inbound requests into upstream calls and back.
#[derive(Debug)]
pub struct Relay<U> {
    upstream: U,
    policy: RelayPolicy,
}

impl<U: Upstream> Relay<U> {
    pub fn new(upstream: U, policy: RelayPolicy) -> Self {
        Self { upstream, policy }
    }

    /// Run one invocation to completion. Always yields exactly one response.
    pub async fn handle(&self, request: InboundRequest) -> RelayedResponse {
        let started = Instant::now();
        let method = request.method.clone();
        let cors = cors::negotiate(&request.headers, &self.policy.expose);

        let (mut response, outcome) = match self.process(request).await {
            Ok(Processed::Preflight) => (RelayedResponse::empty(StatusCode::OK), "preflight"),
            Ok(Processed::Relayed(response)) => (response, "relayed"),
            Err(err) => {
                match &err {
                    RelayError::MissingTarget
                    | RelayError::InvalidTarget(_)
                    | RelayError::PayloadTooLarge(_) => {
                        tracing::debug!(method = %method, error = %err, "Rejected request");
                    }
                    RelayError::BodyRead(_) => {
                        tracing::error!(method = %method, error = %error::describe(&err), "Failed to read request body");
                    }
                    RelayError::Dispatch(e) => {
                        tracing::error!(method = %method, kind = e.kind(), error = %error::describe(&err), "Proxy error");
                    }
                }
                (RelayedResponse::json(err.status(), &err.to_json()), err.outcome())
            }
        };

        response.headers.extend(cors);
        metrics::record_relay(&method, response.status.as_u16(), outcome, started);
        response
    }

    async fn process(&self, request: InboundRequest) -> Result<Processed, RelayError> {
        let InboundRequest {
            method,
            target,
            headers,
            payload,
            stream,
        } = request;

        let raw_target = target::require(target.as_deref())?;
        if cors::is_preflight(&method) {
            return Ok(Processed::Preflight);
        }
        let url = target::parse(raw_target)?;

        let limit = self.policy.max_body_size;
        if body::carries_body(&method)
            && body::declared_length(&headers).is_some_and(|len| len > limit as u64)
        {
            return Err(RelayError::PayloadTooLarge(limit));
        }

        let mut outbound_headers = headers::sanitize(&headers, self.policy.user_agent.as_ref());
        let body = body::extract(&method, payload, stream, limit).await?;
        headers::frame_body(&mut outbound_headers, body.as_ref());

        tracing::debug!(
            method = %method,
            target = %url,
            body_len = body.as_ref().map_or(0, |b| b.len()),
            "Dispatching upstream"
        );

        let upstream = self
            .upstream
            .send(OutboundRequest {
                method,
                url,
                headers: outbound_headers,
                body,
            })
            .await?;

        tracing::info!(
            status = %upstream.status,
            body_len = upstream.body.len(),
            "Upstream responded"
        );

        Ok(Processed::Relayed(response::translate(
            upstream,
            &self.policy.passthrough,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_ORIGIN, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT,
    };
    use bytes::Bytes;
    use futures_util::stream;
    use serde_json::{json, Value};

    use crate::relay::body::BoxError;

    /// Upstream that records what it was asked to send.
    struct RecordingUpstream {
        calls: Mutex<Vec<OutboundRequest>>,
        reply: Option<UpstreamResponse>,
    }

    impl RecordingUpstream {
        fn replying(status: u16, content_type: &'static str, body: &'static [u8]) -> Self {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
            headers.insert("x-upstream-secret", HeaderValue::from_static("leak"));
            Self {
                calls: Mutex::new(Vec::new()),
                reply: Some(UpstreamResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    headers,
                    body: Bytes::from_static(body),
                }),
            }
        }

        fn failing() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                reply: None,
            }
        }

        fn calls(&self) -> Vec<OutboundRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Upstream for RecordingUpstream {
        async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, DispatchError> {
            self.calls.lock().unwrap().push(request);
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => {
                    let err = reqwest::Client::new().get("http://").build().unwrap_err();
                    Err(DispatchError::from(err))
                }
            }
        }
    }

    fn relay(upstream: RecordingUpstream) -> Relay<RecordingUpstream> {
        let policy = RelayPolicy::from_config(&PolicyConfig::default()).unwrap();
        Relay::new(upstream, policy)
    }

    fn relay_with_limit(upstream: RecordingUpstream, max_body_size: usize) -> Relay<RecordingUpstream> {
        let mut config = PolicyConfig::default();
        config.max_body_size = max_body_size;
        Relay::new(upstream, RelayPolicy::from_config(&config).unwrap())
    }

    fn json_body(response: &RelayedResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_is_400_without_network() {
        let relay = relay(RecordingUpstream::replying(200, "text/plain", b"ok"));

        for target in [None, Some(String::new())] {
            let response = relay
                .handle(InboundRequest {
                    method: Method::GET,
                    target,
                    ..Default::default()
                })
                .await;

            assert_eq!(response.status, StatusCode::BAD_REQUEST);
            assert_eq!(response.body.as_ref(), br#"{"error":"Missing url param"}"#);
            assert_eq!(response.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }
        assert!(relay.upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_preflight_answered_locally() {
        let relay = relay(RecordingUpstream::replying(200, "text/plain", b"ok"));

        for target in ["https://api.example.com/items", "not a url"] {
            let response = relay
                .handle(InboundRequest {
                    method: Method::OPTIONS,
                    target: Some(target.into()),
                    ..Default::default()
                })
                .await;

            assert_eq!(response.status, StatusCode::OK);
            assert!(response.body.is_empty());
            assert_eq!(response.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }
        assert!(relay.upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_url_is_client_error() {
        let relay = relay(RecordingUpstream::replying(200, "text/plain", b"ok"));

        let response = relay
            .handle(InboundRequest {
                method: Method::GET,
                target: Some("example.com/no-scheme".into()),
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&response)["error"], "Invalid url param");
        assert!(relay.upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_post_json_forwarded_byte_exact() {
        let relay = relay(RecordingUpstream::replying(201, "application/json", b"{}"));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(HOST, HeaderValue::from_static("relay.example.com"));

        let chunks: Vec<Result<Bytes, BoxError>> = vec![Ok(Bytes::from_static(br#"{"a":1}"#))];
        let response = relay
            .handle(InboundRequest {
                method: Method::POST,
                target: Some("https://api.example.com/items".into()),
                headers,
                payload: Payload::Absent,
                stream: Some(RawBody::new(stream::iter(chunks))),
            })
            .await;

        assert_eq!(response.status, StatusCode::CREATED);

        let calls = relay.upstream.calls();
        assert_eq!(calls.len(), 1);
        let sent = &calls[0];
        assert_eq!(sent.method, Method::POST);
        assert_eq!(sent.url.as_str(), "https://api.example.com/items");
        assert_eq!(sent.body.as_deref(), Some(&br#"{"a":1}"#[..]));
        assert_eq!(sent.headers[CONTENT_LENGTH], "7");
        assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
        assert_eq!(sent.headers[USER_AGENT], "Mozilla/5.0 (compatible; cors-relay)");
        assert!(!sent.headers.contains_key(CONNECTION));
        assert!(!sent.headers.contains_key(HOST));
    }

    #[tokio::test]
    async fn test_structured_payload_reserialized() {
        let relay = relay(RecordingUpstream::replying(200, "application/json", b"{}"));

        relay
            .handle(InboundRequest {
                method: Method::PUT,
                target: Some("https://api.example.com/items/1".into()),
                payload: Payload::Structured(json!({ "name": "widget", "qty": 3 })),
                ..Default::default()
            })
            .await;

        let sent = &relay.upstream.calls()[0];
        let forwarded: Value = serde_json::from_slice(sent.body.as_ref().unwrap()).unwrap();
        assert_eq!(forwarded, json!({ "name": "widget", "qty": 3 }));
    }

    #[tokio::test]
    async fn test_binary_response_relayed_exactly() {
        let relay = relay(RecordingUpstream::replying(
            200,
            "application/octet-stream",
            &[0xFF, 0x00, 0x7A],
        ));

        let response = relay
            .handle(InboundRequest {
                method: Method::GET,
                target: Some("https://cdn.example.com/blob".into()),
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body.as_ref(), &[0xFFu8, 0x00, 0x7A][..]);
        assert_eq!(response.headers[CONTENT_TYPE], "application/octet-stream");
        assert_eq!(response.headers[CONTENT_LENGTH], "3");
        assert!(!response.headers.contains_key("x-upstream-secret"));
        assert_eq!(response.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(relay.upstream.calls()[0].body, None);
    }

    #[tokio::test]
    async fn test_upstream_error_status_passed_through() {
        let relay = relay(RecordingUpstream::replying(
            404,
            "application/json",
            br#"{"msg":"not found"}"#,
        ));

        let response = relay
            .handle(InboundRequest {
                method: Method::GET,
                target: Some("https://api.example.com/missing".into()),
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(response.body.as_ref(), br#"{"msg":"not found"}"#);
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_502_with_details() {
        let relay = relay(RecordingUpstream::failing());

        let response = relay
            .handle(InboundRequest {
                method: Method::GET,
                target: Some("https://unreachable.example.com/".into()),
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        let body = json_body(&response);
        assert_eq!(body["error"], "Proxy error");
        assert!(!body["details"].as_str().unwrap().is_empty());
        assert_eq!(response.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn test_body_read_failure_is_502_and_skips_dispatch() {
        let relay = relay(RecordingUpstream::replying(200, "text/plain", b"ok"));

        let chunks: Vec<Result<Bytes, BoxError>> = vec![Err("connection reset".into())];
        let response = relay
            .handle(InboundRequest {
                method: Method::POST,
                target: Some("https://api.example.com/upload".into()),
                stream: Some(RawBody::new(stream::iter(chunks))),
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        let body = json_body(&response);
        assert_eq!(body["error"], "Proxy error");
        assert!(body["details"].as_str().unwrap().contains("connection reset"));
        assert!(relay.upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_declared_oversized_body_is_413_without_reading() {
        let relay = relay_with_limit(RecordingUpstream::replying(200, "text/plain", b"ok"), 8);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(64));
        let chunks: Vec<Result<Bytes, BoxError>> = vec![Err("must not be read".into())];
        let response = relay
            .handle(InboundRequest {
                method: Method::POST,
                target: Some("https://api.example.com/upload".into()),
                headers,
                stream: Some(RawBody::new(stream::iter(chunks))),
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(json_body(&response)["error"], "Payload too large");
        assert!(relay.upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_chunked_oversized_body_is_413() {
        let relay = relay_with_limit(RecordingUpstream::replying(200, "text/plain", b"ok"), 8);

        let chunks: Vec<Result<Bytes, BoxError>> = vec![
            Ok(Bytes::from_static(b"0123456789abcdef")),
            Ok(Bytes::from_static(b"0123456789abcdef")),
        ];
        let response = relay
            .handle(InboundRequest {
                method: Method::PUT,
                target: Some("https://api.example.com/upload".into()),
                stream: Some(RawBody::new(stream::iter(chunks))),
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let body = json_body(&response);
        assert_eq!(body["error"], "Payload too large");
        assert_eq!(body["details"], "request body exceeds 8 bytes");
        assert!(relay.upstream.calls().is_empty());
    }

    #[tokio::test]
    async fn test_get_with_large_declared_length_still_relayed() {
        let relay = relay_with_limit(RecordingUpstream::replying(200, "text/plain", b"ok"), 8);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from(64));
        let response = relay
            .handle(InboundRequest {
                method: Method::GET,
                target: Some("https://api.example.com/".into()),
                headers,
                ..Default::default()
            })
            .await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(relay.upstream.calls()[0].body, None);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_independent() {
        let relay = relay(RecordingUpstream::replying(200, "text/plain", b"same"));

        let request = || InboundRequest {
            method: Method::GET,
            target: Some("https://api.example.com/ping".into()),
            ..Default::default()
        };

        let first = relay.handle(request()).await;
        let second = relay.handle(request()).await;

        assert_eq!(first, second);
        assert_eq!(relay.upstream.calls().len(), 2);
    }

    #[test]
    fn test_policy_without_spoofing_has_no_user_agent() {
        let mut config = PolicyConfig::default();
        config.spoof_user_agent = false;
        config.passthrough_headers = vec!["ETag".into()];

        let policy = RelayPolicy::from_config(&config).unwrap();
        assert!(policy.user_agent.is_none());
        assert_eq!(policy.passthrough, vec![HeaderName::from_static("etag")]);
        assert_eq!(
            policy.expose,
            "Content-Type, Content-Encoding, Content-Length, etag"
        );
    }
}
