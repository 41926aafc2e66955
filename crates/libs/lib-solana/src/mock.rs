//! In-memory RPC mocks for tests.
//!
//! [`MockConnector`] hands out one [`MockRpc`] per URL and records every
//! health check in order, so failover order can be asserted.
//! Balance and token account reads can be gated on oneshot channels to force
//! responses to complete out of order.

use crate::client::{RpcConnector, RpcProvider, SignatureOutcome};
use async_trait::async_trait;
use lib_core::{AppError, Result};
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Reply to a gated call, delivered when the test chooses.
pub type Gate<T> = oneshot::Receiver<Result<T>>;

pub struct MockRpc {
    url: String,
    check_log: Arc<Mutex<Vec<String>>>,
    healthy: AtomicBool,
    hang_health: AtomicBool,
    lamports: Mutex<HashMap<Pubkey, u64>>,
    token_accounts: Mutex<HashMap<Pubkey, u64>>,
    fail_reads: AtomicBool,
    balance_gates: Mutex<VecDeque<Gate<u64>>>,
    token_gates: Mutex<VecDeque<Gate<Option<u64>>>>,
    read_calls: AtomicUsize,
    statuses: Mutex<VecDeque<Result<SignatureOutcome>>>,
    status_calls: AtomicUsize,
    sent: Mutex<Vec<VersionedTransaction>>,
}

impl MockRpc {
    fn new(url: &str, check_log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            url: url.to_string(),
            check_log,
            healthy: AtomicBool::new(true),
            hang_health: AtomicBool::new(false),
            lamports: Mutex::new(HashMap::new()),
            token_accounts: Mutex::new(HashMap::new()),
            fail_reads: AtomicBool::new(false),
            balance_gates: Mutex::new(VecDeque::new()),
            token_gates: Mutex::new(VecDeque::new()),
            read_calls: AtomicUsize::new(0),
            statuses: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make `getHealth` never answer.
    pub fn set_hang_health(&self, hang: bool) {
        self.hang_health.store(hang, Ordering::SeqCst);
    }

    pub fn set_lamports(&self, owner: Pubkey, lamports: u64) {
        self.lamports.lock().insert(owner, lamports);
    }

    pub fn set_token_account(&self, account: Pubkey, amount: u64) {
        self.token_accounts.lock().insert(account, amount);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// The next `get_balance` call waits for the returned sender.
    pub fn gate_balance(&self) -> oneshot::Sender<Result<u64>> {
        let (tx, rx) = oneshot::channel();
        self.balance_gates.lock().push_back(rx);
        tx
    }

    /// The next `get_token_account_amount` call waits for the returned sender.
    pub fn gate_token_account(&self) -> oneshot::Sender<Result<Option<u64>>> {
        let (tx, rx) = oneshot::channel();
        self.token_gates.lock().push_back(rx);
        tx
    }

    /// Balance and token account reads started so far.
    pub fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    /// Queue the next signature status answer. An empty queue answers "not yet".
    pub fn push_status(&self, status: Result<SignatureOutcome>) {
        self.statuses.lock().push_back(status);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.sent.lock().clone()
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Rpc(format!("{} unavailable", self.url)));
        }
        Ok(())
    }
}

async fn await_gate<T>(gate: Gate<T>) -> Result<T> {
    gate.await
        .map_err(|_| AppError::Internal("mock gate dropped".to_string()))?
}

#[async_trait]
impl RpcProvider for MockRpc {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_health(&self) -> Result<()> {
        self.check_log.lock().push(self.url.clone());
        if self.hang_health.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Rpc(format!("{} is behind", self.url)))
        }
    }

    async fn get_balance(&self, owner: &Pubkey) -> Result<u64> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.balance_gates.lock().pop_front();
        if let Some(gate) = gate {
            return await_gate(gate).await;
        }
        self.check_reads()?;
        Ok(self.lamports.lock().get(owner).copied().unwrap_or(0))
    }

    async fn get_token_account_amount(&self, account: &Pubkey) -> Result<Option<u64>> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.token_gates.lock().pop_front();
        if let Some(gate) = gate {
            return await_gate(gate).await;
        }
        self.check_reads()?;
        Ok(self.token_accounts.lock().get(account).copied())
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        self.sent.lock().push(transaction.clone());
        Ok(transaction
            .signatures
            .first()
            .copied()
            .unwrap_or_else(|| Signature::from([0u8; 64])))
    }

    async fn get_signature_status(&self, _signature: &Signature) -> Result<SignatureOutcome> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().pop_front().unwrap_or(Ok(None))
    }
}

/// Connector returning one shared [`MockRpc`] per URL.
#[derive(Default)]
pub struct MockConnector {
    endpoints: Mutex<HashMap<String, Arc<MockRpc>>>,
    check_log: Arc<Mutex<Vec<String>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mock behind `url`, created healthy on first use.
    pub fn endpoint(&self, url: &str) -> Arc<MockRpc> {
        let mut endpoints = self.endpoints.lock();
        Arc::clone(
            endpoints
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(MockRpc::new(url, Arc::clone(&self.check_log)))),
        )
    }

    /// URLs checked so far, in order.
    pub fn health_checks(&self) -> Vec<String> {
        self.check_log.lock().clone()
    }

    pub fn clear_health_checks(&self) {
        self.check_log.lock().clear();
    }
}

impl RpcConnector for MockConnector {
    fn connect(&self, url: &str) -> Arc<dyn RpcProvider> {
        self.endpoint(url)
    }
}
