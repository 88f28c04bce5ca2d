// Listener plumbing shared by the tracker and peer binaries

use anyhow::{Context, Result};
use axum::{serve, Router};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

/// Bind a TCP listener on `bind:port`
pub async fn bind(bind: &str, port: u16) -> Result<TcpListener> {
    let addr = format!("{}:{}", bind, port);
    info!(address = %addr, "Starting TCP listener");

    let listener = TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind TCP listener to {}", addr))?;

    info!(address = %addr, "TCP listener bound successfully");
    Ok(listener)
}

/// Serve `router` with request tracing until `shutdown` resolves
pub async fn run(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = router.layer(
        ServiceBuilder::new().layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        ),
    );

    serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }

    info!("Shutdown signal received, starting graceful shutdown");
}
