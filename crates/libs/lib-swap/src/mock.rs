//! Test doubles for the quote source and the wallet.

use crate::wallet::{WalletAdapter, WalletError};
use async_trait::async_trait;
use lib_core::{AppError, Result};
use lib_solana::jupiter::types::{RoutePlanStep, SwapInfo};
use lib_solana::jupiter::{QuoteRequest, QuoteResponse, QuoteSource, SwapTransactionResponse};
use lib_solana::{Asset, ConnectionHandle};
use lib_utils::b64::b64_encode;
use parking_lot::Mutex;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use tokio::sync::oneshot;

const USDC_MINT: Pubkey = Pubkey::from_str_const("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

pub fn sol() -> Asset {
    Asset::native()
}

pub fn usdc() -> Asset {
    Asset::new(USDC_MINT, "USDC", 6)
}

/// Quote source answering 161 USDC per SOL.
#[derive(Default)]
pub struct MockQuoteSource {
    requests: Mutex<Vec<QuoteRequest>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    no_route: AtomicBool,
    swap_users: Mutex<Vec<Pubkey>>,
}

impl MockQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<QuoteRequest> {
        self.requests.lock().clone()
    }

    /// The next quote call blocks until the returned sender fires.
    pub fn gate_next_quote(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    pub fn fail_with_no_route(&self, fail: bool) {
        self.no_route.store(fail, Ordering::SeqCst);
    }

    pub fn swap_users(&self) -> Vec<Pubkey> {
        self.swap_users.lock().clone()
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        self.requests.lock().push(request.clone());
        let gate = self.gates.lock().pop_front();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.no_route.load(Ordering::SeqCst) {
            return Err(AppError::NoRoute("No routes found".to_string()));
        }

        let out_amount = request.amount / 1_000 * 161;
        let step = RoutePlanStep {
            swap_info: SwapInfo {
                amm_key: Pubkey::new_unique().to_string(),
                label: Some("Whirlpool".to_string()),
                input_mint: request.input_mint.to_string(),
                output_mint: request.output_mint.to_string(),
                in_amount: request.amount.to_string(),
                out_amount: out_amount.to_string(),
                fee_amount: None,
                fee_mint: None,
            },
            percent: 100,
        };

        Ok(QuoteResponse {
            input_mint: request.input_mint.to_string(),
            output_mint: request.output_mint.to_string(),
            in_amount: request.amount,
            out_amount,
            price_impact_pct: 0.0005,
            slippage_bps: request.slippage_bps,
            route_plan: vec![step],
            raw: serde_json::json!({
                "inAmount": request.amount.to_string(),
                "outAmount": out_amount.to_string(),
            }),
        })
    }

    async fn build_swap(&self, _quote: &QuoteResponse, user: &Pubkey) -> Result<SwapTransactionResponse> {
        self.swap_users.lock().push(*user);
        let tx = VersionedTransaction::from(Transaction::new_unsigned(Message::new(&[], Some(user))));
        let bytes = bincode::serialize(&tx).map_err(|e| AppError::Internal(e.to_string()))?;
        Ok(SwapTransactionResponse {
            swap_transaction: b64_encode(bytes),
            last_valid_block_height: 1_000,
            prioritization_fee_lamports: None,
        })
    }
}

/// Wallet that approves unless told to decline, then submits through the
/// given connection.
pub struct MockWallet {
    key: Option<Pubkey>,
    decline: AtomicBool,
    signed: AtomicU8,
}

impl MockWallet {
    pub fn connected() -> Self {
        Self {
            key: Some(Pubkey::new_unique()),
            decline: AtomicBool::new(false),
            signed: AtomicU8::new(0),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            key: None,
            ..Self::connected()
        }
    }

    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    pub fn signed(&self) -> u8 {
        self.signed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletAdapter for MockWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.key
    }

    async fn sign_and_send(
        &self,
        mut transaction: VersionedTransaction,
        connection: &ConnectionHandle,
    ) -> std::result::Result<Signature, WalletError> {
        if self.key.is_none() {
            return Err(WalletError::NotConnected);
        }
        if self.decline.load(Ordering::SeqCst) {
            return Err(WalletError::Declined);
        }

        let n = self.signed.fetch_add(1, Ordering::SeqCst) + 1;
        let signature = Signature::from([n; 64]);
        transaction.signatures = vec![signature];

        connection
            .rpc()
            .send_transaction(&transaction)
            .await
            .map_err(|e| WalletError::Send(e.to_string()))
    }
}
