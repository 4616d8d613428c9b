//! TLS termination for the listener.

use std::io;
use std::path::Path;
use std::time::Duration;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::config::TlsConfig;
use crate::lifecycle::shutdown;

/// Time in-flight relays get to finish after shutdown is triggered.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, io::Error> {
    for (what, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{what} file not found: {}", path.display()),
            ));
        }
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Serve `app` over TLS on an already-bound listener until shutdown.
pub async fn serve_tls(
    listener: TcpListener,
    app: Router,
    tls: &TlsConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), io::Error> {
    let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;

    let handle = axum_server::Handle::new();
    let trigger = handle.clone();
    tokio::spawn(async move {
        shutdown::wait(shutdown).await;
        trigger.graceful_shutdown(Some(DRAIN_TIMEOUT));
    });

    tracing::info!(cert = %tls.cert_path, "TLS enabled");

    axum_server::from_tcp_rustls(listener.into_std()?, rustls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
}
