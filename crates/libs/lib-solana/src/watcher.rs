//! # Transaction Watcher
//!
//! Tracks submitted signatures until they reach a terminal status and
//! broadcasts each status change.
//!
//! A transaction moves `Pending -> Confirmed` or `Pending -> Failed` exactly
//! once. When the status cannot be determined (the RPC call fails, or nothing
//! is known before the confirmation timeout) the transaction is marked
//! failed with [`FailureReason::Unverified`]; it may still have landed, which
//! is why every notification carries an explorer link.
//!
//! Settled entries stay queryable for one confirmation timeout, then are
//! pruned on the next registration.

use crate::connection::ConnectionHandle;
use chrono::{DateTime, Utc};
use lib_core::{AppError, Config, Result};
use lib_utils::now_utc;
use parking_lot::Mutex;
use solana_sdk::signature::Signature;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const UPDATE_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The transaction executed and the program returned an error.
    OnChain(String),
    /// Confirmation could not be verified; the outcome is unknown.
    Unverified(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    pub signature: Signature,
    pub submitted_at: DateTime<Utc>,
    pub status: TransactionStatus,
    pub failure: Option<FailureReason>,
}

/// Status change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub signature: Signature,
    pub status: TransactionStatus,
    pub failure: Option<FailureReason>,
    pub explorer_url: String,
}

impl TransactionUpdate {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// User-facing summary.
    pub fn message(&self) -> String {
        match (&self.status, &self.failure) {
            (TransactionStatus::Pending, _) => format!("Transaction sent: {}", self.explorer_url),
            (TransactionStatus::Confirmed, _) => format!("Swap confirmed: {}", self.explorer_url),
            (_, Some(FailureReason::OnChain(e))) => {
                format!("Transaction failed: {} ({})", e, self.explorer_url)
            }
            (_, Some(FailureReason::Unverified(_))) | (_, None) => format!(
                "Transaction confirmation could not be verified. Check {}",
                self.explorer_url
            ),
        }
    }

    /// Terminal outcome as a result.
    pub fn into_result(self) -> Result<Signature> {
        match (self.status, self.failure) {
            (TransactionStatus::Confirmed, _) => Ok(self.signature),
            (_, Some(FailureReason::OnChain(e))) => Err(AppError::Transaction(e)),
            (_, Some(FailureReason::Unverified(reason))) => Err(AppError::ConfirmationUnknown {
                signature: self.signature.to_string(),
                reason,
                explorer_url: self.explorer_url,
            }),
            (status, None) => Err(AppError::Internal(format!(
                "Transaction {} has no outcome yet ({:?})",
                self.signature, status
            ))),
        }
    }
}

struct Entry {
    transaction: PendingTransaction,
    settled_at: Option<Instant>,
}

#[derive(Clone)]
pub struct TransactionWatcher {
    inner: Arc<Inner>,
}

struct Inner {
    poll_interval: Duration,
    timeout: Duration,
    config: Config,
    registry: Mutex<HashMap<Signature, Entry>>,
    updates: broadcast::Sender<TransactionUpdate>,
}

impl TransactionWatcher {
    pub fn new(config: &Config) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                poll_interval: config.confirmation_poll_interval,
                timeout: config.confirmation_timeout,
                config: config.clone(),
                registry: Mutex::new(HashMap::new()),
                updates,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TransactionUpdate> {
        self.inner.updates.subscribe()
    }

    pub fn get(&self, signature: &Signature) -> Option<PendingTransaction> {
        self.inner
            .registry
            .lock()
            .get(signature)
            .map(|entry| entry.transaction.clone())
    }

    pub fn explorer_url(&self, signature: &Signature) -> String {
        self.inner.config.explorer_url(&signature.to_string())
    }

    /// Start tracking `signature` through `handle`.
    ///
    /// Watching an already registered signature returns its current entry and
    /// starts nothing new.
    pub fn watch(&self, signature: Signature, handle: Arc<ConnectionHandle>) -> PendingTransaction {
        let pending = {
            let mut registry = self.inner.registry.lock();
            if let Some(existing) = registry.get(&signature) {
                debug!(%signature, "Signature already watched");
                return existing.transaction.clone();
            }
            let retention = self.inner.timeout;
            registry.retain(|_, entry| !matches!(entry.settled_at, Some(at) if at.elapsed() >= retention));

            let pending = PendingTransaction {
                signature,
                submitted_at: now_utc(),
                status: TransactionStatus::Pending,
                failure: None,
            };
            registry.insert(
                signature,
                Entry {
                    transaction: pending.clone(),
                    settled_at: None,
                },
            );
            pending
        };

        info!(%signature, endpoint = %handle.endpoint(), "Watching transaction");
        self.emit(signature, TransactionStatus::Pending, None);

        let watcher = self.clone();
        tokio::spawn(async move { watcher.poll(signature, handle).await });

        pending
    }

    /// Wait for the terminal outcome of a watched signature.
    pub async fn wait_for(&self, signature: &Signature) -> Result<Signature> {
        let mut updates = self.subscribe();

        loop {
            match self.get(signature) {
                None => {
                    return Err(AppError::Internal(format!("Signature {} is not watched", signature)))
                }
                Some(entry) if entry.status.is_terminal() => {
                    return self.update_for(&entry).into_result();
                }
                Some(_) => {}
            }

            match updates.recv().await {
                Ok(update) if update.signature == *signature && update.is_terminal() => {
                    return update.into_result();
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(AppError::Internal("Transaction watcher stopped".to_string()))
                }
            }
        }
    }

    async fn poll(&self, signature: Signature, handle: Arc<ConnectionHandle>) {
        let deadline = Instant::now() + self.inner.timeout;

        loop {
            match handle.rpc().get_signature_status(&signature).await {
                Ok(Some(Ok(()))) => {
                    self.settle(signature, TransactionStatus::Confirmed, None);
                    return;
                }
                Ok(Some(Err(e))) => {
                    self.settle(signature, TransactionStatus::Failed, Some(FailureReason::OnChain(e)));
                    return;
                }
                Ok(None) => {}
                Err(e) => {
                    self.settle(
                        signature,
                        TransactionStatus::Failed,
                        Some(FailureReason::Unverified(e.to_string())),
                    );
                    return;
                }
            }

            if Instant::now() >= deadline {
                let reason = format!(
                    "No confirmation after {}s",
                    self.inner.timeout.as_secs()
                );
                self.settle(signature, TransactionStatus::Failed, Some(FailureReason::Unverified(reason)));
                return;
            }

            tokio::time::sleep(self.inner.poll_interval).await;
        }
    }

    /// Move a pending entry to its terminal status. Returns false if it was
    /// already terminal.
    fn settle(&self, signature: Signature, status: TransactionStatus, failure: Option<FailureReason>) -> bool {
        {
            let mut registry = self.inner.registry.lock();
            let Some(entry) = registry.get_mut(&signature) else {
                return false;
            };
            if entry.transaction.status.is_terminal() {
                return false;
            }
            entry.transaction.status = status;
            entry.transaction.failure = failure.clone();
            entry.settled_at = Some(Instant::now());
        }

        match &failure {
            None => info!(%signature, "Transaction confirmed"),
            Some(FailureReason::OnChain(e)) => error!(%signature, "Transaction failed on-chain: {}", e),
            Some(FailureReason::Unverified(e)) => warn!(%signature, "Transaction outcome unknown: {}", e),
        }

        self.emit(signature, status, failure);
        true
    }

    fn update_for(&self, entry: &PendingTransaction) -> TransactionUpdate {
        TransactionUpdate {
            signature: entry.signature,
            status: entry.status,
            failure: entry.failure.clone(),
            explorer_url: self.explorer_url(&entry.signature),
        }
    }

    fn emit(&self, signature: Signature, status: TransactionStatus, failure: Option<FailureReason>) {
        let update = TransactionUpdate {
            signature,
            status,
            failure,
            explorer_url: self.explorer_url(&signature),
        };
        // No subscribers is fine.
        let _ = self.inner.updates.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionManager;
    use crate::mock::{MockConnector, MockRpc};

    const URL: &str = "https://rpc.test";

    async fn setup() -> (TransactionWatcher, Arc<ConnectionHandle>, Arc<MockRpc>) {
        let connector = Arc::new(MockConnector::new());
        let rpc = connector.endpoint(URL);
        let connections = ConnectionManager::new(vec![URL.to_string()], connector, Duration::from_secs(5));
        let handle = connections.auto_reconnect().await.unwrap();
        (TransactionWatcher::new(&Config::default()), handle, rpc)
    }

    fn signature(n: u8) -> Signature {
        Signature::from([n; 64])
    }

    async fn next_terminal(rx: &mut broadcast::Receiver<TransactionUpdate>) -> TransactionUpdate {
        loop {
            let update = rx.recv().await.unwrap();
            if update.is_terminal() {
                return update;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirmed_after_pending_polls() {
        let (watcher, handle, rpc) = setup().await;
        let mut rx = watcher.subscribe();
        rpc.push_status(Ok(None));
        rpc.push_status(Ok(None));
        rpc.push_status(Ok(Some(Ok(()))));

        let signature = signature(1);
        watcher.watch(signature, handle);

        let pending = rx.recv().await.unwrap();
        assert_eq!(pending.status, TransactionStatus::Pending);

        let update = next_terminal(&mut rx).await;
        assert_eq!(update.status, TransactionStatus::Confirmed);
        assert!(update.explorer_url.contains(&signature.to_string()));
        assert_eq!(rpc.status_calls(), 3);

        // Polling stopped after the terminal state.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rpc.status_calls(), 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_chain_failure() {
        let (watcher, handle, rpc) = setup().await;
        rpc.push_status(Ok(Some(Err("custom program error: 0x1771".to_string()))));

        let signature = signature(2);
        watcher.watch(signature, handle);

        let err = watcher.wait_for(&signature).await.unwrap_err();
        assert!(matches!(err, AppError::Transaction(ref e) if e.contains("0x1771")));
        assert_eq!(watcher.get(&signature).unwrap().status, TransactionStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_unverified() {
        let (watcher, handle, rpc) = setup().await;
        rpc.push_status(Err(AppError::Rpc("connection reset".to_string())));
        let mut rx = watcher.subscribe();

        let signature = signature(3);
        watcher.watch(signature, handle);

        let update = next_terminal(&mut rx).await;
        assert_eq!(update.status, TransactionStatus::Failed);
        assert!(matches!(update.failure, Some(FailureReason::Unverified(_))));
        assert!(update.message().contains("could not be verified"));

        match update.into_result() {
            Err(AppError::ConfirmationUnknown { explorer_url, .. }) => {
                assert!(explorer_url.starts_with("https://solana.fm/tx/"))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_unverified() {
        let (watcher, handle, rpc) = setup().await;

        let signature = signature(4);
        watcher.watch(signature, handle);

        let err = watcher.wait_for(&signature).await.unwrap_err();
        assert!(matches!(err, AppError::ConfirmationUnknown { .. }));
        assert!(rpc.status_calls() > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_registration_is_ignored() {
        let (watcher, handle, rpc) = setup().await;
        rpc.push_status(Ok(Some(Ok(()))));
        let mut rx = watcher.subscribe();

        let signature = signature(5);
        watcher.watch(signature, handle.clone());
        watcher.watch(signature, handle);

        next_terminal(&mut rx).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        // One pending and one terminal notification, from a single poller.
        assert!(rx.try_recv().is_err());
        assert_eq!(rpc.status_calls(), 1);
    }

    #[tokio::test]
    async fn test_terminal_state_is_absorbing() {
        let (watcher, handle, rpc) = setup().await;
        rpc.push_status(Ok(Some(Ok(()))));

        let signature = signature(6);
        watcher.watch(signature, handle);
        watcher.wait_for(&signature).await.unwrap();

        assert!(!watcher.settle(
            signature,
            TransactionStatus::Failed,
            Some(FailureReason::Unverified("late".to_string()))
        ));
        assert_eq!(watcher.get(&signature).unwrap().status, TransactionStatus::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_entries_are_pruned_after_timeout() {
        let (watcher, handle, rpc) = setup().await;
        rpc.push_status(Ok(Some(Ok(()))));
        rpc.push_status(Ok(Some(Ok(()))));

        let first = signature(7);
        watcher.watch(first, handle.clone());
        watcher.wait_for(&first).await.unwrap();

        // Still queryable within the retention window.
        tokio::time::sleep(Duration::from_secs(10)).await;
        watcher.watch(signature(8), handle.clone());
        assert!(watcher.get(&first).is_some());

        tokio::time::sleep(Config::default().confirmation_timeout).await;
        watcher.watch(signature(9), handle);

        assert!(watcher.get(&first).is_none());
        assert!(watcher.get(&signature(9)).is_some());
    }
}
