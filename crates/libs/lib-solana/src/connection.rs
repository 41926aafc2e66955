//! # Connection Manager
//!
//! Owns the active RPC endpoint for the whole engine.
//!
//! The active connection is published as an immutable
//! `Option<Arc<ConnectionHandle>>` on a `watch` channel. Switching endpoints
//! publishes a new handle; readers holding the old one keep a consistent view
//! and never observe a half-switched state. `None` means disconnected.
//!
//! Endpoint switches (`select_endpoint`, `auto_reconnect`) are serialized.
//! Reconnection runs only when asked; there is no background retry.

use crate::client::{RpcConnector, RpcProvider};
use lib_core::{AppError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Last observed liveness of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
}

/// One endpoint plus the RPC client talking to it.
pub struct ConnectionHandle {
    id: u64,
    endpoint: String,
    health: HealthStatus,
    rpc: Arc<dyn RpcProvider>,
}

impl ConnectionHandle {
    /// Monotonic id; a new handle always has a larger id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn health(&self) -> HealthStatus {
        self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health == HealthStatus::Healthy
    }

    pub fn rpc(&self) -> &Arc<dyn RpcProvider> {
        &self.rpc
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("health", &self.health)
            .finish()
    }
}

/// A configured endpoint as shown in the endpoint picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub url: String,
    pub health: HealthStatus,
    pub active: bool,
}

/// Receiver side of the active connection.
pub type ConnectionReceiver = watch::Receiver<Option<Arc<ConnectionHandle>>>;

/// Owner of the active RPC connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    endpoints: Vec<String>,
    connector: Arc<dyn RpcConnector>,
    health_timeout: Duration,
    last_good: Mutex<usize>,
    health: RwLock<HashMap<String, HealthStatus>>,
    next_id: AtomicU64,
    active: watch::Sender<Option<Arc<ConnectionHandle>>>,
    switching: tokio::sync::Mutex<()>,
}

impl ConnectionManager {
    pub fn new(endpoints: Vec<String>, connector: Arc<dyn RpcConnector>, health_timeout: Duration) -> Self {
        let (active, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                endpoints,
                connector,
                health_timeout,
                last_good: Mutex::new(0),
                health: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                active,
                switching: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Active handle, or `None` when disconnected.
    pub fn current_handle(&self) -> Option<Arc<ConnectionHandle>> {
        self.inner.active.borrow().clone()
    }

    pub fn subscribe(&self) -> ConnectionReceiver {
        self.inner.active.subscribe()
    }

    /// Configured endpoints in order with their last observed health.
    pub fn endpoints(&self) -> Vec<EndpointStatus> {
        let health = self.inner.health.read();
        let active = self.current_handle();
        self.inner
            .endpoints
            .iter()
            .map(|url| EndpointStatus {
                url: url.clone(),
                health: health.get(url).copied().unwrap_or(HealthStatus::Unknown),
                active: active.as_ref().is_some_and(|h| h.endpoint() == url),
            })
            .collect()
    }

    /// Force the active connection to `url` and check its health.
    ///
    /// The handle is published even when the check fails (with
    /// [`HealthStatus::Unhealthy`]); the failure is returned as
    /// [`AppError::Connectivity`].
    #[instrument(skip(self))]
    pub async fn select_endpoint(&self, url: &str) -> Result<Arc<ConnectionHandle>> {
        let _switch = self.inner.switching.lock().await;

        let (rpc, health) = self.check_endpoint(url).await;
        let handle = self.publish(url, health, rpc);

        if health == HealthStatus::Healthy {
            if let Some(index) = self.inner.endpoints.iter().position(|e| e == url) {
                *self.inner.last_good.lock() = index;
            }
            info!(endpoint = %url, "Switched RPC endpoint");
            Ok(handle)
        } else {
            warn!(endpoint = %url, "Selected RPC endpoint failed its health check");
            Err(AppError::Connectivity(format!("RPC endpoint {} failed its health check", url)))
        }
    }

    /// Find the first healthy endpoint, starting from the last known-good one.
    ///
    /// Candidates are checked one at a time in configured order (wrapping).
    /// When none is healthy the engine is left disconnected.
    #[instrument(skip(self))]
    pub async fn auto_reconnect(&self) -> Result<Arc<ConnectionHandle>> {
        let _switch = self.inner.switching.lock().await;

        let count = self.inner.endpoints.len();
        if count == 0 {
            self.inner.active.send_replace(None);
            return Err(AppError::Connectivity("No RPC endpoints configured".to_string()));
        }

        let start = *self.inner.last_good.lock() % count;
        for offset in 0..count {
            let index = (start + offset) % count;
            let url = &self.inner.endpoints[index];

            let (rpc, health) = self.check_endpoint(url).await;
            if health == HealthStatus::Healthy {
                *self.inner.last_good.lock() = index;
                let handle = self.publish(url, health, rpc);
                info!(endpoint = %url, attempt = offset + 1, "Connected to RPC endpoint");
                return Ok(handle);
            }
            warn!(endpoint = %url, "RPC endpoint unhealthy, trying next");
        }

        self.inner.active.send_replace(None);
        warn!(endpoints = count, "All RPC endpoints failed health checks");
        Err(AppError::Connectivity(format!(
            "All {} RPC endpoints failed health checks",
            count
        )))
    }

    /// Run a bounded liveness check and record the outcome.
    async fn check_endpoint(&self, url: &str) -> (Arc<dyn RpcProvider>, HealthStatus) {
        let rpc = self.inner.connector.connect(url);

        let health = match tokio::time::timeout(self.inner.health_timeout, rpc.get_health()).await {
            Ok(Ok(())) => HealthStatus::Healthy,
            Ok(Err(e)) => {
                warn!(endpoint = %url, "Health check failed: {}", e);
                HealthStatus::Unhealthy
            }
            Err(_) => {
                warn!(endpoint = %url, timeout_ms = self.inner.health_timeout.as_millis() as u64, "Health check timed out");
                HealthStatus::Unhealthy
            }
        };

        self.inner.health.write().insert(url.to_string(), health);
        (rpc, health)
    }

    fn publish(&self, url: &str, health: HealthStatus, rpc: Arc<dyn RpcProvider>) -> Arc<ConnectionHandle> {
        let handle = Arc::new(ConnectionHandle {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            endpoint: url.to_string(),
            health,
            rpc,
        });
        self.inner.active.send_replace(Some(Arc::clone(&handle)));
        handle
    }
}
