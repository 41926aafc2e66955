//! # Swap Executor
//!
//! Turns an accepted quote into a submitted transaction:
//!
//! 1. Build the swap transaction from the quote's route
//! 2. Decode it (base64 + bincode)
//! 3. Hand it to the wallet to sign and submit
//! 4. Register the signature with the transaction watcher
//!
//! A quote that no longer answers the latest trade intent is never submitted.

use crate::quote_engine::{Quote, QuoteEngine};
use crate::wallet::WalletAdapter;
use lib_core::{AppError, Result};
use lib_solana::jupiter::QuoteSource;
use lib_solana::{ConnectionManager, TransactionWatcher};
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

/// Clears the in-progress flag when the swap ends, including on cancellation.
struct InProgress<'a>(&'a watch::Sender<bool>);

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

pub struct SwapExecutor {
    quotes: QuoteEngine,
    source: Arc<dyn QuoteSource>,
    connections: ConnectionManager,
    watcher: TransactionWatcher,
    wallet: Arc<dyn WalletAdapter>,
    in_progress: watch::Sender<bool>,
}

impl SwapExecutor {
    pub fn new(
        quotes: QuoteEngine,
        source: Arc<dyn QuoteSource>,
        connections: ConnectionManager,
        watcher: TransactionWatcher,
        wallet: Arc<dyn WalletAdapter>,
    ) -> Self {
        let (in_progress, _) = watch::channel(false);
        Self {
            quotes,
            source,
            connections,
            watcher,
            wallet,
            in_progress,
        }
    }

    /// Swap-in-progress flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.in_progress.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        *self.in_progress.borrow()
    }

    /// Execute `quote`. Returns the submitted signature; confirmation is
    /// reported by the watcher.
    #[instrument(skip(self, quote), fields(
        from = %quote.intent().source.symbol,
        to = %quote.intent().destination.symbol,
        in_amount = quote.in_amount()
    ))]
    pub async fn execute(&self, quote: &Quote) -> Result<Signature> {
        let claimed = self.in_progress.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if !claimed {
            return Err(AppError::SwapInProgress);
        }
        let _guard = InProgress(&self.in_progress);

        let user = self.wallet.public_key().ok_or(AppError::WalletNotConnected)?;
        let handle = self
            .connections
            .current_handle()
            .ok_or_else(|| AppError::Connectivity("No active RPC connection".to_string()))?;
        self.ensure_current(quote)?;

        let swap = self.source.build_swap(quote.route(), &user).await?;
        let transaction = swap.decode_transaction()?;

        // The intent may have changed while the payload was fetched.
        self.ensure_current(quote)?;

        let signature = self
            .wallet
            .sign_and_send(transaction, &handle)
            .await
            .map_err(AppError::from)?;

        info!(%signature, endpoint = %handle.endpoint(), "Swap submitted");
        self.watcher.watch(signature, handle);
        Ok(signature)
    }

    fn ensure_current(&self, quote: &Quote) -> Result<()> {
        if self.quotes.is_current(quote) {
            Ok(())
        } else {
            warn!("Refusing to submit a quote for an outdated intent");
            Err(AppError::StaleQuote)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sol, usdc, MockQuoteSource, MockWallet};
    use crate::quote_engine::TradeIntent;
    use lib_core::Config;
    use lib_solana::mock::{MockConnector, MockRpc};
    use lib_solana::TransactionStatus;
    use std::time::Duration;

    const URL: &str = "https://rpc.test";

    struct Fixture {
        executor: Arc<SwapExecutor>,
        quotes: QuoteEngine,
        source: Arc<MockQuoteSource>,
        wallet: Arc<MockWallet>,
        watcher: TransactionWatcher,
        rpc: Arc<MockRpc>,
    }

    async fn fixture(wallet: MockWallet) -> Fixture {
        let connector = Arc::new(MockConnector::new());
        let rpc = connector.endpoint(URL);
        let connections = ConnectionManager::new(vec![URL.to_string()], connector, Duration::from_secs(5));
        connections.auto_reconnect().await.unwrap();

        let source = Arc::new(MockQuoteSource::new());
        let wallet = Arc::new(wallet);
        let quotes = QuoteEngine::new(source.clone(), Duration::from_millis(500));
        let watcher = TransactionWatcher::new(&Config::default());
        let executor = Arc::new(SwapExecutor::new(
            quotes.clone(),
            source.clone(),
            connections,
            watcher.clone(),
            wallet.clone(),
        ));

        Fixture {
            executor,
            quotes,
            source,
            wallet,
            watcher,
            rpc,
        }
    }

    async fn quote(f: &Fixture, amount: f64) -> Quote {
        f.quotes
            .request_quote(TradeIntent::new(sol(), usdc(), amount, 50))
            .await
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_swap_is_watched() {
        let f = fixture(MockWallet::connected()).await;
        let q = quote(&f, 1.5).await;

        let signature = f.executor.execute(&q).await.unwrap();

        assert_eq!(f.rpc.sent().len(), 1);
        assert_eq!(f.source.swap_users(), vec![f.wallet.public_key().unwrap()]);
        assert_eq!(f.watcher.get(&signature).unwrap().status, TransactionStatus::Pending);
        assert!(!f.executor.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_decline_never_reaches_watcher() {
        let f = fixture(MockWallet::connected()).await;
        f.wallet.set_decline(true);
        let mut updates = f.watcher.subscribe();
        let q = quote(&f, 1.0).await;

        let err = f.executor.execute(&q).await.unwrap_err();

        assert!(matches!(err, AppError::UserDeclined));
        assert!(f.rpc.sent().is_empty());
        assert!(updates.try_recv().is_err());
        assert!(!f.executor.is_busy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_quote_is_rejected() {
        let f = fixture(MockWallet::connected()).await;
        let old = quote(&f, 1.5).await;
        let _new = quote(&f, 2.0).await;

        let err = f.executor.execute(&old).await.unwrap_err();

        assert!(matches!(err, AppError::StaleQuote));
        assert!(!err.is_user_visible());
        assert!(f.source.swap_users().is_empty());
        assert_eq!(f.wallet.signed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_not_connected() {
        let f = fixture(MockWallet::disconnected()).await;
        let q = quote(&f, 1.0).await;

        assert!(matches!(f.executor.execute(&q).await, Err(AppError::WalletNotConnected)));
        assert!(f.source.swap_users().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_swap_while_busy_is_rejected() {
        let f = fixture(MockWallet::connected()).await;
        let q = quote(&f, 1.0).await;

        f.executor.in_progress.send_replace(true);
        assert!(matches!(f.executor.execute(&q).await, Err(AppError::SwapInProgress)));

        f.executor.in_progress.send_replace(false);
        assert!(f.executor.execute(&q).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_swap_confirmation_reaches_subscribers() {
        let f = fixture(MockWallet::connected()).await;
        f.rpc.push_status(Ok(None));
        f.rpc.push_status(Ok(Some(Ok(()))));
        let q = quote(&f, 1.0).await;

        let signature = f.executor.execute(&q).await.unwrap();

        assert_eq!(f.watcher.wait_for(&signature).await.unwrap(), signature);
    }
}
