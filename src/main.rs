// ============================================================================
// Order Book Server
// Single-instrument WebSocket order book
// ============================================================================

use anyhow::Context;
use realtime_order_book::prelude::*;
use realtime_order_book::telemetry;
use realtime_order_book::transport::{server, TransportConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// How long to wait for the hub to drain on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("info");

    let config = Arc::new(TransportConfig::from_env().context("invalid transport configuration")?);

    let (hub, worker) = BroadcastHub::start(&config.hub).context("failed to start broadcast hub")?;
    let engine = create_from_config(BookConfig::new(config.instrument.clone()), hub.clone())
        .context("invalid book configuration")?;

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    info!(
        addr = %config.listen_addr,
        instrument = %config.instrument,
        ws_path = %config.ws_path,
        "order book server listening"
    );

    server::serve(
        listener,
        Arc::new(engine),
        Arc::clone(&hub),
        Arc::clone(&config),
        shutdown_signal(),
    )
    .await;

    // Open sessions still hold hub handles; the worker stops once they close.
    drop(hub);
    let drained = tokio::task::spawn_blocking(move || worker.join());
    if tokio::time::timeout(SHUTDOWN_GRACE, drained).await.is_err() {
        warn!("sessions still open at shutdown deadline");
    }

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
