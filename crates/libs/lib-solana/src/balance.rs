//! # Balance Service
//!
//! Spendable balances per (mint, owner), fetched through the active
//! connection.
//!
//! Native SOL is read from the owner's system account. Every other asset is
//! read from the owner's associated token account; a missing account is a
//! zero balance.
//!
//! Fetches for the same key may overlap (periodic refresh, on-demand refresh,
//! a connection switch). Each fetch takes a token from a monotonic counter and
//! a result is only written if its token is newer than the one already
//! written, so a slow, older response can never overwrite a newer one.
//! A failed fetch leaves the previous record in place.
//!
//! Forgetting an owner records the current token as a watermark; fetches for
//! that owner started before it are discarded when they complete.

use crate::connection::ConnectionManager;
use crate::spl_token::associated_token_address;
use crate::types::{Asset, NATIVE_DECIMALS};
use chrono::{DateTime, Utc};
use lib_core::{AppError, Result};
use lib_utils::now_utc;
use lib_utils::units::to_display_units;
use parking_lot::Mutex;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, instrument, warn};

/// A fetched balance. Replaced whole, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRecord {
    pub asset: Asset,
    pub owner: Pubkey,
    /// Human-readable quantity
    pub quantity: f64,
    /// Quantity in base units
    pub raw_amount: u64,
    pub fetched_at: DateTime<Utc>,
}

/// What the presentation layer shows for a balance.
#[derive(Debug, Clone, PartialEq)]
pub enum BalanceState {
    Resolved(BalanceRecord),
    /// Never fetched successfully; carries the last failure.
    Unresolved(String),
}

/// (mint, owner)
pub type BalanceKey = (Pubkey, Pubkey);
pub type BalanceBook = HashMap<BalanceKey, BalanceState>;

#[derive(Default)]
struct Slot {
    written_token: u64,
    record: Option<BalanceRecord>,
}

#[derive(Default)]
struct Slots {
    by_key: HashMap<BalanceKey, Slot>,
    /// Owner -> last token issued before it was forgotten
    forgotten: HashMap<Pubkey, u64>,
}

#[derive(Clone)]
pub struct BalanceService {
    inner: Arc<Inner>,
}

struct Inner {
    connections: ConnectionManager,
    refresh_interval: Duration,
    next_token: AtomicU64,
    slots: Mutex<Slots>,
    book: watch::Sender<BalanceBook>,
}

impl BalanceService {
    pub fn new(connections: ConnectionManager, refresh_interval: Duration) -> Self {
        let (book, _) = watch::channel(BalanceBook::new());
        Self {
            inner: Arc::new(Inner {
                connections,
                refresh_interval,
                next_token: AtomicU64::new(0),
                slots: Mutex::new(Slots::default()),
                book,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<BalanceBook> {
        self.inner.book.subscribe()
    }

    /// Last published state for a key.
    pub fn state(&self, asset: &Asset, owner: &Pubkey) -> Option<BalanceState> {
        self.inner.book.borrow().get(&(asset.address, *owner)).cloned()
    }

    /// Fetch the balance of `asset` held by `owner`.
    ///
    /// When a newer fetch for the same key has already completed, its record
    /// is returned instead of this call's (older) result.
    #[instrument(skip(self, asset), fields(asset = %asset.symbol))]
    pub async fn get_balance(&self, asset: &Asset, owner: &Pubkey) -> Result<BalanceRecord> {
        let token = self.inner.next_token.fetch_add(1, Ordering::SeqCst) + 1;

        let result = match self.inner.connections.current_handle() {
            Some(handle) => fetch_record(handle.rpc().as_ref(), asset, owner).await,
            None => Err(AppError::Connectivity("No active RPC connection".to_string())),
        };
        self.apply(asset, owner, token, result)
    }

    fn apply(
        &self,
        asset: &Asset,
        owner: &Pubkey,
        token: u64,
        result: Result<BalanceRecord>,
    ) -> Result<BalanceRecord> {
        let key = (asset.address, *owner);
        let mut slots = self.inner.slots.lock();
        if slots.forgotten.get(owner).is_some_and(|watermark| token <= *watermark) {
            debug!(token, "Discarding balance fetched for a forgotten owner");
            return Err(AppError::Superseded);
        }
        let slot = slots.by_key.entry(key).or_default();

        match result {
            Ok(record) if token > slot.written_token => {
                slot.written_token = token;
                slot.record = Some(record.clone());
                self.inner.book.send_modify(|book| {
                    book.insert(key, BalanceState::Resolved(record.clone()));
                });
                debug!(quantity = record.quantity, token, "Balance updated");
                Ok(record)
            }
            Ok(_) => {
                debug!(token, newer = slot.written_token, "Discarding out-of-order balance");
                slot.record.clone().ok_or(AppError::Superseded)
            }
            Err(e) => {
                warn!("Balance fetch failed: {}", e);
                if slot.record.is_none() {
                    let reason = e.to_string();
                    self.inner.book.send_modify(|book| {
                        book.insert(key, BalanceState::Unresolved(reason));
                    });
                }
                Err(e)
            }
        }
    }

    /// Refresh every asset for `owner`, logging failures.
    pub async fn refresh_all(&self, assets: &[Asset], owner: &Pubkey) {
        for asset in assets {
            if let Err(e) = self.get_balance(asset, owner).await {
                debug!(asset = %asset.symbol, "Refresh failed: {}", e);
            }
        }
    }

    /// Drop all entries for `owner` (wallet disconnected or switched).
    pub fn forget_owner(&self, owner: &Pubkey) {
        let mut slots = self.inner.slots.lock();
        let watermark = self.inner.next_token.load(Ordering::SeqCst);
        slots.forgotten.insert(*owner, watermark);
        slots.by_key.retain(|(_, o), _| o != owner);
        self.inner.book.send_modify(|book| book.retain(|(_, o), _| o != owner));
    }

    /// Refresh `assets` on the configured interval and whenever the active
    /// connection changes. Stops when the returned handle is aborted or the
    /// last clone of the service is dropped.
    pub fn spawn_refresh(&self, assets: Vec<Asset>, owner: Pubkey) -> JoinHandle<()> {
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);
        let mut connection_rx = self.inner.connections.subscribe();
        let refresh_interval = self.inner.refresh_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = connection_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        debug!("Connection changed, refreshing balances");
                    }
                }
                let Some(inner) = inner.upgrade() else {
                    debug!("Balance service dropped, stopping refresh");
                    break;
                };
                BalanceService { inner }.refresh_all(&assets, &owner).await;
            }
        })
    }
}

async fn fetch_record(
    rpc: &dyn crate::client::RpcProvider,
    asset: &Asset,
    owner: &Pubkey,
) -> Result<BalanceRecord> {
    let (raw_amount, quantity) = if asset.is_native() {
        let lamports = rpc.get_balance(owner).await?;
        (lamports, to_display_units(lamports, NATIVE_DECIMALS))
    } else {
        let account = associated_token_address(owner, &asset.address);
        let amount = rpc.get_token_account_amount(&account).await?.unwrap_or(0);
        (amount, asset.to_display_units(amount))
    };

    Ok(BalanceRecord {
        asset: asset.clone(),
        owner: *owner,
        quantity,
        raw_amount,
        fetched_at: now_utc(),
    })
}
