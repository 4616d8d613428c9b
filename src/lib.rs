//! CORS-enabled HTTP forward relay.
//!
//! A caller names a target with `?url=`; the relay forwards the method,
//! sanitized headers and body there, then returns the target's status,
//! content headers and raw bytes with permissive CORS headers attached.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{InboundRequest, Relay, RelayedResponse};
