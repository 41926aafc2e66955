//! # Solana RPC Client
//!
//! The RPC seam of the swap engine. Everything above this module talks to an
//! endpoint through the [`RpcProvider`] trait, and obtains providers through an
//! [`RpcConnector`], so the connection manager, balance service and watcher can
//! be exercised against in-memory mocks.
//!
//! [`SolanaClient`] is the production implementation over the nonblocking
//! `solana_client` RPC client.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lib_core::Commitment;
//! use lib_solana::client::{RpcProvider, SolanaClient};
//! use std::time::Duration;
//!
//! # async fn example() -> lib_core::Result<()> {
//! let client = SolanaClient::builder()
//!     .url("https://api.devnet.solana.com")
//!     .commitment(Commitment::Confirmed)
//!     .timeout(Duration::from_secs(30))
//!     .build();
//!
//! client.get_health().await?;
//! # Ok(())
//! # }
//! ```

use crate::spl_token::decode_token_amount;
use async_trait::async_trait;
use lib_core::{AppError, Commitment, Result};
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of a signature status lookup.
///
/// `None` means the cluster has not reached the requested commitment for the
/// signature yet (or does not know it).
pub type SignatureOutcome = Option<std::result::Result<(), String>>;

/// Operations the engine needs from a Solana RPC endpoint.
#[async_trait]
pub trait RpcProvider: Send + Sync {
    /// URL this provider talks to.
    fn url(&self) -> &str;

    /// Liveness check (`getHealth`).
    async fn get_health(&self) -> Result<()>;

    /// Lamports held by `owner`.
    async fn get_balance(&self, owner: &Pubkey) -> Result<u64>;

    /// Raw amount held by a token account, `None` if the account does not exist.
    async fn get_token_account_amount(&self, account: &Pubkey) -> Result<Option<u64>>;

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature>;

    async fn get_signature_status(&self, signature: &Signature) -> Result<SignatureOutcome>;
}

/// Builds providers for endpoint URLs.
pub trait RpcConnector: Send + Sync {
    fn connect(&self, url: &str) -> Arc<dyn RpcProvider>;
}

pub(crate) fn commitment_config(commitment: Commitment) -> CommitmentConfig {
    match commitment {
        Commitment::Processed => CommitmentConfig::processed(),
        Commitment::Confirmed => CommitmentConfig::confirmed(),
        Commitment::Finalized => CommitmentConfig::finalized(),
    }
}

fn rpc_error(context: &str, url: &str, err: ClientError) -> AppError {
    AppError::Rpc(format!("{} ({}): {}", context, url, err))
}

/// RPC client bound to a single endpoint.
pub struct SolanaClient {
    rpc: Arc<RpcClient>,
    url: String,
    commitment: CommitmentConfig,
}

/// Builder for configuring SolanaClient.
#[derive(Debug, Clone)]
pub struct SolanaClientBuilder {
    url: String,
    commitment: Commitment,
    timeout: Duration,
}

impl Default for SolanaClientBuilder {
    fn default() -> Self {
        Self {
            url: DEFAULT_RPC_URL.to_string(),
            commitment: Commitment::Confirmed,
            timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

impl SolanaClientBuilder {
    /// Set the endpoint URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the commitment used for balances and signature status.
    pub fn commitment(mut self, commitment: Commitment) -> Self {
        self.commitment = commitment;
        self
    }

    /// Set the per-request transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the SolanaClient with configured settings.
    pub fn build(self) -> SolanaClient {
        let commitment = commitment_config(self.commitment);
        debug!(url = %self.url, commitment = %self.commitment, "Creating Solana RPC client");

        let rpc = RpcClient::new_with_timeout_and_commitment(self.url.clone(), self.timeout, commitment);
        SolanaClient {
            rpc: Arc::new(rpc),
            url: self.url,
            commitment,
        }
    }
}

impl SolanaClient {
    pub fn builder() -> SolanaClientBuilder {
        SolanaClientBuilder::default()
    }

    /// Create a client for `url` at the given commitment.
    pub fn new(url: impl Into<String>, commitment: Commitment) -> Self {
        Self::builder().url(url).commitment(commitment).build()
    }

    /// Underlying RPC client for calls outside the [`RpcProvider`] surface.
    pub fn rpc(&self) -> Arc<RpcClient> {
        Arc::clone(&self.rpc)
    }
}

#[async_trait]
impl RpcProvider for SolanaClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn get_health(&self) -> Result<()> {
        self.rpc
            .get_health()
            .await
            .map_err(|e| rpc_error("getHealth failed", &self.url, e))
    }

    async fn get_balance(&self, owner: &Pubkey) -> Result<u64> {
        self.rpc
            .get_balance(owner)
            .await
            .map_err(|e| rpc_error("getBalance failed", &self.url, e))
    }

    async fn get_token_account_amount(&self, account: &Pubkey) -> Result<Option<u64>> {
        let response = self
            .rpc
            .get_account_with_commitment(account, self.commitment)
            .await
            .map_err(|e| rpc_error("getAccountInfo failed", &self.url, e))?;

        match response.value {
            Some(account) => decode_token_amount(&account.data).map(Some),
            None => Ok(None),
        }
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let signature = self
            .rpc
            .send_transaction(transaction)
            .await
            .map_err(|e| rpc_error("sendTransaction failed", &self.url, e))?;

        info!(%signature, url = %self.url, "Transaction submitted");
        Ok(signature)
    }

    async fn get_signature_status(&self, signature: &Signature) -> Result<SignatureOutcome> {
        let status = self
            .rpc
            .get_signature_status_with_commitment(signature, self.commitment)
            .await
            .map_err(|e| rpc_error("getSignatureStatuses failed", &self.url, e))?;

        Ok(status.map(|result| result.map_err(|err| err.to_string())))
    }
}

/// Connector producing [`SolanaClient`]s.
#[derive(Debug, Clone)]
pub struct SolanaConnector {
    commitment: Commitment,
    timeout: Duration,
}

impl SolanaConnector {
    pub fn new(commitment: Commitment) -> Self {
        Self {
            commitment,
            timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl RpcConnector for SolanaConnector {
    fn connect(&self, url: &str) -> Arc<dyn RpcProvider> {
        Arc::new(
            SolanaClient::builder()
                .url(url)
                .commitment(self.commitment)
                .timeout(self.timeout)
                .build(),
        )
    }
}
