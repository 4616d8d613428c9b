//! HTTP hosting subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers, graceful shutdown)
//!     → request.rs (request ID, `url` param, body stream → InboundRequest)
//!     → relay (one invocation)
//!     → response.rs (RelayedResponse → Axum response)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - A caller disconnect drops the handler future, which drops the
//!   in-flight outbound request with it
//! - No request timeout layer; the outbound client timeout bounds each call

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{build_router, HttpServer, ServerError};
