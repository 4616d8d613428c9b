//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the relay handler at `listener.path`
//! - Wire up middleware (tracing, request ID)
//! - Serve on a bound listener, plain or TLS, until shutdown

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::{RelayConfig, ValidationError};
use crate::http::request::{into_inbound, request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::shutdown;
use crate::net::tls;
use crate::relay::{HttpUpstream, Relay, RelayPolicy, Upstream};

/// Errors raised while building or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid relay policy: {0}")]
    Policy(#[from] ValidationError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server for the relay.
pub struct HttpServer {
    router: Router,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a server relaying through a `reqwest` client built from `config`.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let upstream = HttpUpstream::new(&config.timeouts, &config.relay)?;
        Self::with_upstream(config, upstream)
    }

    /// Create a server relaying through `upstream`.
    pub fn with_upstream<U: Upstream>(config: RelayConfig, upstream: U) -> Result<Self, ServerError> {
        let policy = RelayPolicy::from_config(&config.relay)?;
        let relay = Arc::new(Relay::new(upstream, policy));
        let router = build_router(&config, relay);
        Ok(Self { router, config })
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            path = %self.config.listener.path,
            "HTTP server starting"
        );

        match &self.config.listener.tls {
            Some(tls_config) => {
                tls::serve_tls(listener, self.router, tls_config, shutdown).await?;
            }
            None => {
                axum::serve(listener, self.router)
                    .with_graceful_shutdown(shutdown::wait(shutdown))
                    .await?;
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router<U: Upstream>(config: &RelayConfig, relay: Arc<Relay<U>>) -> Router {
    Router::new()
        .route(&config.listener.path, any(relay_handler::<U>))
        .with_state(relay)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
        )
}

/// Relay one request. Never fails: errors are already JSON responses.
async fn relay_handler<U: Upstream>(
    State(relay): State<Arc<Relay<U>>>,
    request: Request<Body>,
) -> Response {
    let span = tracing::info_span!(
        "relay",
        request_id = %request_id(request.headers()),
        method = %request.method()
    );

    relay
        .handle(into_inbound(request))
        .instrument(span)
        .await
        .into_response()
}
