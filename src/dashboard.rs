//! Dashboard server lifecycle.
//!
//! `stopped -> starting -> listening -> stopping -> stopped`. The server owns
//! its [`HistoryStore`] and closes it on every `stop()`, including one made
//! before `start()`, so a stopped server cannot be started again.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::DashboardConfig;
use crate::error::{Result, TesterError};
use crate::history::db::HistoryStore;
use crate::server::build_router;
use crate::state::DashboardState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Stopped,
    Starting,
    Listening,
    Stopping,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServerStatus::Stopped => "stopped",
            ServerStatus::Starting => "starting",
            ServerStatus::Listening => "listening",
            ServerStatus::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

struct Running {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
    local_addr: SocketAddr,
}

pub struct DashboardServer {
    config: DashboardConfig,
    store: Arc<HistoryStore>,
    status: RwLock<ServerStatus>,
    running: Mutex<Option<Running>>,
}

impl DashboardServer {
    /// Open the history store named by `config.db_path` and wrap it.
    pub fn open(config: DashboardConfig) -> Result<Self> {
        let store = HistoryStore::open(&config.db_path).map_err(|e| {
            TesterError::Dashboard(format!("Failed to initialize history store: {}", e))
        })?;
        Ok(Self::with_store(config, Arc::new(store)))
    }

    pub fn with_store(config: DashboardConfig, store: Arc<HistoryStore>) -> Self {
        Self {
            config,
            store,
            status: RwLock::new(ServerStatus::Stopped),
            running: Mutex::new(None),
        }
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_status(&self, status: ServerStatus) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub fn store(&self) -> &Arc<HistoryStore> {
        &self.store
    }

    /// Bind and serve in a background task. Returns the bound address, which
    /// differs from the configured one when port 0 was requested.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(TesterError::Dashboard(format!(
                "Dashboard is already {}",
                self.status()
            )));
        }
        if self.store.is_closed() {
            return Err(TesterError::Dashboard(
                "History store is closed; the dashboard cannot be restarted".to_string(),
            ));
        }

        self.set_status(ServerStatus::Starting);
        let addr = self.config.bind_addr();
        let bound = match TcpListener::bind(&addr).await {
            Ok(listener) => listener.local_addr().map(|local| (listener, local)),
            Err(e) => Err(e),
        };
        let (listener, local_addr) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                self.set_status(ServerStatus::Stopped);
                return Err(TesterError::Dashboard(format!(
                    "Failed to bind {}: {}",
                    addr, e
                )));
            }
        };

        let router = build_router(DashboardState::shared(self.store.clone()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        *running = Some(Running {
            shutdown_tx,
            handle,
            local_addr,
        });
        self.set_status(ServerStatus::Listening);
        info!("Dashboard listening on http://{}", local_addr);
        Ok(local_addr)
    }

    /// Graceful shutdown, then close the store. From `stopped` only the
    /// store is closed, and calling it again is a no-op.
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(Running {
            shutdown_tx,
            handle,
            local_addr,
        }) = running.take()
        else {
            return self.store.close();
        };

        self.set_status(ServerStatus::Stopping);
        if shutdown_tx.send(()).is_err() {
            warn!("Dashboard server task on {} already exited", local_addr);
        }
        let served = handle.await;
        let closed = self.store.close();
        self.set_status(ServerStatus::Stopped);
        info!("Dashboard on {} stopped", local_addr);

        match served {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(TesterError::Dashboard(format!("Server error: {}", e)));
            }
            Err(e) => {
                return Err(TesterError::Dashboard(format!("Server task failed: {}", e)));
            }
        }
        closed
    }
}
