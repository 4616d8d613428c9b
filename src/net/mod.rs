//! Network layer subsystem.
//!
//! Plain TCP is served directly by Axum; when `listener.tls` is set the
//! same router is served through a rustls acceptor instead.

pub mod tls;
