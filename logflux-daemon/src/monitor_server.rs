//! HTTP endpoint serving the pipeline snapshot.
//!
//! `GET /monitor` returns the current [`SystemSnapshot`] as JSON:
//!
//! ```json
//! {"handleLine":42,"tps":8.4,"readChanLen":0,"writeChanLen":3,"runTime":"2m0s","errNum":1}
//! ```
//!
//! The handler only reads monitor state, so concurrent scrapes never
//! disturb the throughput window.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use logflux_core::config::MonitorConfig;
use logflux_log_pipeline::{Monitor, SystemSnapshot};

/// Build the monitor router.
pub fn build_monitor_router(monitor: Arc<Monitor>) -> Router {
    Router::new()
        .route("/monitor", get(snapshot))
        .with_state(monitor)
}

async fn snapshot(State(monitor): State<Arc<Monitor>>) -> Json<SystemSnapshot> {
    Json(monitor.snapshot())
}

/// Bind the monitor listener.
///
/// A bind failure is fatal for the daemon, so this runs before the
/// server task is spawned and reports the error to the caller.
pub async fn bind(config: &MonitorConfig) -> Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid monitor listen address: {}", e))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind monitor endpoint {}: {}", addr, e))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "monitor endpoint is exposed on all interfaces"
        );
    }
    Ok(listener)
}

/// Serve the router on an already-bound listener until `cancel` fires.
pub fn spawn_monitor_server(
    listener: TcpListener,
    router: Router,
    cancel: CancellationToken,
) -> JoinHandle<Result<()>> {
    tokio::spawn(async move {
        let local_addr = listener.local_addr()?;
        tracing::info!(listen_addr = %local_addr, "monitor endpoint active");

        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .map_err(|e| anyhow::anyhow!("monitor server failed: {}", e))?;

        tracing::debug!("monitor endpoint stopped");
        Ok(())
    })
}
