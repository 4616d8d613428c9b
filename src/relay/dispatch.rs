//! Outbound dispatch.
//!
//! The [`Upstream`] trait is the only place the relay touches the network.
//! [`HttpUpstream`] is the production implementation on top of `reqwest`.

use std::future::Future;
use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::config::{PolicyConfig, TimeoutConfig, TlsVersion};

/// The request sent to the target.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// The target's answer, with the body fully buffered.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Any failure while talking to the target.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct DispatchError(#[from] reqwest::Error);

impl DispatchError {
    /// Coarse failure class for logs.
    pub fn kind(&self) -> &'static str {
        let err = &self.0;
        if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else if err.is_body() || err.is_decode() {
            "body"
        } else if err.is_redirect() {
            "redirect"
        } else {
            "request"
        }
    }
}

/// Sends one request to a target and buffers the reply.
pub trait Upstream: Send + Sync + 'static {
    fn send(
        &self,
        request: OutboundRequest,
    ) -> impl Future<Output = Result<UpstreamResponse, DispatchError>> + Send;
}

/// `reqwest`-backed upstream.
///
/// Idle connections are not kept: each relay invocation stands alone.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
}

impl HttpUpstream {
    pub fn new(timeouts: &TimeoutConfig, policy: &PolicyConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(Duration::from_secs(timeouts.upstream_secs))
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(!policy.verify_upstream_certificates);

        if let Some(version) = policy.tls_min_version {
            builder = builder.min_tls_version(tls_version(version));
        }

        if !policy.verify_upstream_certificates {
            tracing::warn!("Upstream certificate verification is disabled");
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

fn tls_version(version: TlsVersion) -> reqwest::tls::Version {
    match version {
        TlsVersion::Tls1_0 => reqwest::tls::Version::TLS_1_0,
        TlsVersion::Tls1_1 => reqwest::tls::Version::TLS_1_1,
        TlsVersion::Tls1_2 => reqwest::tls::Version::TLS_1_2,
        TlsVersion::Tls1_3 => reqwest::tls::Version::TLS_1_3,
    }
}

impl Upstream for HttpUpstream {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, DispatchError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
