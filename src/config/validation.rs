//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and that every
//! string destined for a header or socket actually parses. All errors are
//! collected, not just the first.

use std::net::SocketAddr;
use std::path::Path;

use axum::http::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::relay::headers::is_hop_by_hop;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("listener.path `{0}` must start with `/`")]
    MountPath(String),

    #[error("listener.tls file not found: {0}")]
    TlsFile(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("relay.max_body_size must be greater than zero")]
    ZeroBodySize,

    #[error("relay.user_agent `{0}` is not a valid header value")]
    UserAgent(String),

    #[error("relay.passthrough_headers entry `{0}` is not a valid header name")]
    HeaderName(String),

    #[error("relay.passthrough_headers entry `{0}` is a hop-by-hop header")]
    HopByHopHeader(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Check a parsed configuration, returning every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(listener.bind_address.clone()));
    }
    if !listener.path.starts_with('/') {
        errors.push(ValidationError::MountPath(listener.path.clone()));
    }
    if let Some(tls) = &listener.tls {
        for file in [&tls.cert_path, &tls.key_path] {
            if !Path::new(file).exists() {
                errors.push(ValidationError::TlsFile(file.clone()));
            }
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("upstream_secs"));
    }

    let policy = &config.relay;
    if policy.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodySize);
    }
    if policy.spoof_user_agent && HeaderValue::from_str(&policy.user_agent).is_err() {
        errors.push(ValidationError::UserAgent(policy.user_agent.clone()));
    }
    for name in &policy.passthrough_headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName(name.clone()));
        } else if is_hop_by_hop(name) {
            errors.push(ValidationError::HopByHopHeader(name.clone()));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
