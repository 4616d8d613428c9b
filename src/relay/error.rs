//! Relay error taxonomy.
//!
//! Client errors cover the target URL (400) and an oversized body (413);
//! proxy errors (502) cover everything between reading the caller's body and
//! reading the upstream's.

use std::error::Error as StdError;

use axum::http::StatusCode;
use serde_json::{json, Value};
use thiserror::Error;

use crate::relay::body::{BoxError, ReadError};
use crate::relay::dispatch::DispatchError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Missing url param")]
    MissingTarget,

    #[error("Invalid url param: {0}")]
    InvalidTarget(String),

    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("failed to read request body: {0}")]
    BodyRead(#[source] BoxError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<ReadError> for RelayError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::TooLarge { limit } => RelayError::PayloadTooLarge(limit),
            ReadError::Stream(source) => RelayError::BodyRead(source),
        }
    }
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingTarget | RelayError::InvalidTarget(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::BodyRead(_) | RelayError::Dispatch(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Metrics label.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::MissingTarget
            | RelayError::InvalidTarget(_)
            | RelayError::PayloadTooLarge(_) => "client_error",
            RelayError::BodyRead(_) => "body_read_error",
            RelayError::Dispatch(_) => "upstream_error",
        }
    }

    /// JSON body returned to the caller.
    pub fn to_json(&self) -> Value {
        match self {
            RelayError::MissingTarget => json!({ "error": "Missing url param" }),
            RelayError::InvalidTarget(reason) => {
                json!({ "error": "Invalid url param", "details": reason })
            }
            RelayError::PayloadTooLarge(_) => {
                json!({ "error": "Payload too large", "details": self.to_string() })
            }
            RelayError::BodyRead(_) | RelayError::Dispatch(_) => {
                json!({ "error": "Proxy error", "details": describe(self) })
            }
        }
    }
}

/// Render an error and its sources as one line.
///
/// Transport errors keep the interesting part (DNS, refused, TLS) in
/// `source()`, so the top-level message alone is rarely useful.
pub fn describe(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
