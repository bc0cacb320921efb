//! Monitor agent: a second, optional listener exposing process vars.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{routing::get, Extension, Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct DebugVars {
    pub pid: u32,
    pub version: &'static str,
    pub uptime_secs: u64,
}

#[derive(Clone, Copy)]
struct StartedAt(Instant);

async fn debug_vars(Extension(StartedAt(started)): Extension<StartedAt>) -> Json<DebugVars> {
    Json(DebugVars {
        pid: std::process::id(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: started.elapsed().as_secs(),
    })
}

pub fn monitor_router(started: Instant) -> Router {
    Router::new()
        .route("/debug/vars", get(debug_vars))
        .layer(Extension(StartedAt(started)))
}

pub struct MonitorAgent {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl MonitorAgent {
    pub async fn start(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("monitor failed to bind {addr}"))?;
        let addr = listener.local_addr()?;
        let (stop, stopped) = oneshot::channel::<()>();
        let app = monitor_router(Instant::now());
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stopped.await;
                })
                .await
        });
        info!(%addr, "Monitor agent listening");
        Ok(Self { addr, stop, task })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn stop(self, grace: Duration) -> Result<()> {
        let _ = self.stop.send(());
        let mut task = self.task;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(joined) => {
                joined.context("monitor task panicked")?.context("monitor serve failed")?;
                info!("Monitor agent stopped");
            }
            Err(_) => {
                warn!("Monitor agent did not stop in time, aborting");
                task.abort();
            }
        }
        Ok(())
    }
}
