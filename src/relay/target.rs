//! Target URL validation.
//!
//! Presence is checked before CORS negotiation, syntax after the preflight
//! short-circuit. Both failures are client errors; neither reaches the network.

use url::Url;

use crate::relay::error::RelayError;

/// Name of the query parameter carrying the target URL.
pub const TARGET_PARAM: &str = "url";

/// Return the raw target, rejecting an absent or empty parameter.
pub fn require(raw: Option<&str>) -> Result<&str, RelayError> {
    match raw.map(str::trim) {
        Some(target) if !target.is_empty() => Ok(target),
        _ => Err(RelayError::MissingTarget),
    }
}

/// Parse the target as an absolute `http`/`https` URL with a host.
pub fn parse(raw: &str) -> Result<Url, RelayError> {
    let url = Url::parse(raw).map_err(|e| RelayError::InvalidTarget(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RelayError::InvalidTarget(format!(
            "unsupported scheme `{}`",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(RelayError::InvalidTarget("missing host".to_string()));
    }

    Ok(url)
}
