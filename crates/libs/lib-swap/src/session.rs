//! # Swap Session
//!
//! Wires the connection manager, balance service, quote engine, executor and
//! transaction watcher together. This is the only type a front end needs.
//!
//! Ordering errors ([`AppError::Superseded`], [`AppError::StaleQuote`]) are
//! bookkeeping and are never returned from the session.

use crate::executor::SwapExecutor;
use crate::quote_engine::{Quote, QuoteEngine, QuoteState, TradeIntent};
use crate::wallet::WalletAdapter;
use lib_core::{AppError, Config, Result};
use lib_solana::connection::ConnectionReceiver;
use lib_solana::jupiter::QuoteSource;
use lib_solana::{
    Asset, BalanceBook, BalanceRecord, BalanceService, ConnectionHandle, ConnectionManager, EndpointStatus,
    RpcConnector, TransactionUpdate, TransactionWatcher,
};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct SwapSession {
    connections: ConnectionManager,
    balances: BalanceService,
    quotes: QuoteEngine,
    executor: SwapExecutor,
    watcher: TransactionWatcher,
    wallet: Arc<dyn WalletAdapter>,
}

impl SwapSession {
    pub fn new(
        config: &Config,
        connector: Arc<dyn RpcConnector>,
        source: Arc<dyn QuoteSource>,
        wallet: Arc<dyn WalletAdapter>,
    ) -> Self {
        let connections = ConnectionManager::new(config.rpc_endpoints.clone(), connector, config.rpc_health_timeout);
        let balances = BalanceService::new(connections.clone(), config.balance_refresh_interval);
        let quotes = QuoteEngine::new(Arc::clone(&source), config.quote_debounce);
        let watcher = TransactionWatcher::new(config);
        let executor = SwapExecutor::new(
            quotes.clone(),
            source,
            connections.clone(),
            watcher.clone(),
            Arc::clone(&wallet),
        );

        Self {
            connections,
            balances,
            quotes,
            executor,
            watcher,
            wallet,
        }
    }

    // region: --- Connection

    /// Connect to the first healthy configured endpoint.
    pub async fn connect(&self) -> Result<Arc<ConnectionHandle>> {
        self.connections.auto_reconnect().await
    }

    pub async fn select_endpoint(&self, url: &str) -> Result<Arc<ConnectionHandle>> {
        self.connections.select_endpoint(url).await
    }

    pub fn endpoints(&self) -> Vec<EndpointStatus> {
        self.connections.endpoints()
    }

    pub fn connection(&self) -> ConnectionReceiver {
        self.connections.subscribe()
    }

    // endregion: --- Connection

    // region: --- Balances

    /// Fetch the connected wallet's balance of `asset`.
    pub async fn balance(&self, asset: &Asset) -> Result<BalanceRecord> {
        let owner = self.wallet.public_key().ok_or(AppError::WalletNotConnected)?;
        self.balances.get_balance(asset, &owner).await
    }

    /// Keep the connected wallet's balances of `assets` fresh.
    pub fn start_balance_refresh(&self, assets: Vec<Asset>) -> Result<JoinHandle<()>> {
        let owner = self.wallet.public_key().ok_or(AppError::WalletNotConnected)?;
        Ok(self.balances.spawn_refresh(assets, owner))
    }

    pub fn balances(&self) -> watch::Receiver<BalanceBook> {
        self.balances.subscribe()
    }

    // endregion: --- Balances

    // region: --- Quotes

    /// Ask for a quote for the user's latest input.
    ///
    /// Returns `Ok(None)` when a newer input replaced this one.
    pub async fn update_intent(&self, intent: TradeIntent) -> Result<Option<Quote>> {
        match self.quotes.request_quote(intent).await {
            Ok(quote) => Ok(Some(quote)),
            Err(e) if !e.is_user_visible() => {
                debug!("Quote request dropped: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn quote_state(&self) -> watch::Receiver<QuoteState> {
        self.quotes.subscribe()
    }

    pub fn current_quote(&self) -> Option<Quote> {
        self.quotes.current()
    }

    // endregion: --- Quotes

    // region: --- Swap

    /// Execute the displayed quote.
    pub async fn swap(&self) -> Result<Signature> {
        let quote = self
            .quotes
            .current()
            .ok_or_else(|| AppError::InvalidInput("No quote to execute".to_string()))?;

        match self.executor.execute(&quote).await {
            Err(AppError::StaleQuote) => Err(AppError::InvalidInput(
                "The quote changed, review the new quote before swapping".to_string(),
            )),
            other => other,
        }
    }

    pub fn swap_in_progress(&self) -> watch::Receiver<bool> {
        self.executor.subscribe()
    }

    pub fn transactions(&self) -> broadcast::Receiver<TransactionUpdate> {
        self.watcher.subscribe()
    }

    /// Wait until `signature` reaches a terminal status.
    pub async fn wait_for_confirmation(&self, signature: &Signature) -> Result<Signature> {
        self.watcher.wait_for(signature).await
    }

    // endregion: --- Swap

    /// Call when the wallet disconnects or switches accounts.
    pub fn wallet_changed(&self, previous: Option<&Pubkey>) {
        self.quotes.invalidate();
        if let Some(owner) = previous {
            self.balances.forget_owner(owner);
        }
        info!(connected = self.wallet.public_key().is_some(), "Wallet changed");
    }
}
