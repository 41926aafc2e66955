//! # Quote Engine
//!
//! Keeps one up-to-date quote for the latest trade intent.
//!
//! Every call to [`QuoteEngine::request_quote`] starts a new intent lineage
//! and waits out the debounce period. If a newer intent arrived meanwhile the
//! call returns [`AppError::Superseded`] without contacting the quote source.
//! A response that comes back after its lineage was superseded is dropped, so
//! the published [`QuoteState`] always belongs to the latest intent.

use chrono::{DateTime, Utc};
use lib_core::config::MAX_SLIPPAGE_BPS;
use lib_core::{AppError, Result};
use lib_solana::jupiter::{QuoteRequest, QuoteResponse, QuoteSource};
use lib_solana::Asset;
use lib_utils::now_utc;
use lib_utils::validation::validate_positive_finite;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// What the user wants to trade.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeIntent {
    pub source: Asset,
    pub destination: Asset,
    /// Human-readable amount of `source`
    pub amount: f64,
    pub slippage_bps: u16,
}

impl TradeIntent {
    pub fn new(source: Asset, destination: Asset, amount: f64, slippage_bps: u16) -> Self {
        Self {
            source,
            destination,
            amount,
            slippage_bps,
        }
    }

    /// Check the intent and return the input amount in base units.
    pub fn validate(&self) -> Result<u64> {
        if self.source.address == self.destination.address {
            return Err(AppError::InvalidInput(
                "Source and destination assets must differ".to_string(),
            ));
        }
        validate_positive_finite(self.amount, "Amount").map_err(AppError::InvalidInput)?;
        self.source.to_base_units(self.amount)
    }

    /// Slippage limited to `[1, MAX_SLIPPAGE_BPS]`.
    pub fn effective_slippage_bps(&self) -> u16 {
        self.slippage_bps.clamp(1, MAX_SLIPPAGE_BPS)
    }
}

/// A quote for one specific intent. Built only by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    lineage: u64,
    intent: TradeIntent,
    response: QuoteResponse,
    received_at: DateTime<Utc>,
}

impl Quote {
    pub fn intent(&self) -> &TradeIntent {
        &self.intent
    }

    /// Input amount in base units of the source asset.
    pub fn in_amount(&self) -> u64 {
        self.response.in_amount
    }

    /// Output amount in base units of the destination asset.
    pub fn out_amount(&self) -> u64 {
        self.response.out_amount
    }

    /// Output amount in destination units, for display.
    pub fn out_amount_display(&self) -> f64 {
        self.intent.destination.to_display_units(self.response.out_amount)
    }

    /// Price impact as a fraction.
    pub fn price_impact_pct(&self) -> f64 {
        self.response.price_impact_pct
    }

    pub fn route_labels(&self) -> Vec<String> {
        self.response.route_labels()
    }

    /// The route exactly as returned by the quote source.
    pub fn route(&self) -> &QuoteResponse {
        &self.response
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub(crate) fn lineage(&self) -> u64 {
        self.lineage
    }
}

/// Quote display state
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteState {
    Idle,
    Loading,
    Ready(Quote),
    NoRoute(String),
    Failed(String),
}

impl QuoteState {
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            QuoteState::Ready(quote) => Some(quote),
            _ => None,
        }
    }
}

/// Latest lineage and the intent it was started for.
#[derive(Default)]
struct Lineage {
    generation: u64,
    intent: Option<TradeIntent>,
}

#[derive(Clone)]
pub struct QuoteEngine {
    inner: Arc<Inner>,
}

struct Inner {
    source: Arc<dyn QuoteSource>,
    debounce: Duration,
    lineage: Mutex<Lineage>,
    state: watch::Sender<QuoteState>,
}

impl QuoteEngine {
    pub fn new(source: Arc<dyn QuoteSource>, debounce: Duration) -> Self {
        let (state, _) = watch::channel(QuoteState::Idle);
        Self {
            inner: Arc::new(Inner {
                source,
                debounce,
                lineage: Mutex::new(Lineage::default()),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QuoteState> {
        self.inner.state.subscribe()
    }

    pub fn state(&self) -> QuoteState {
        self.inner.state.borrow().clone()
    }

    /// The displayed quote, if it answers the latest intent.
    pub fn current(&self) -> Option<Quote> {
        let quote = self.inner.state.borrow().quote().cloned()?;
        self.is_current(&quote).then_some(quote)
    }

    /// True if `quote` was produced for the latest intent.
    pub fn is_current(&self, quote: &Quote) -> bool {
        let lineage = self.inner.lineage.lock();
        lineage.generation == quote.lineage() && lineage.intent.as_ref() == Some(quote.intent())
    }

    /// Drop the displayed quote and cancel any pending request.
    pub fn invalidate(&self) {
        let mut lineage = self.inner.lineage.lock();
        lineage.generation += 1;
        lineage.intent = None;
        self.inner.state.send_replace(QuoteState::Idle);
        debug!(generation = lineage.generation, "Quote invalidated");
    }

    /// Quote `intent` after the debounce period.
    #[instrument(skip(self, intent), fields(
        from = %intent.source.symbol,
        to = %intent.destination.symbol,
        amount = intent.amount
    ))]
    pub async fn request_quote(&self, intent: TradeIntent) -> Result<Quote> {
        let lineage = self.begin(&intent);

        let amount = match intent.validate() {
            Ok(amount) => amount,
            Err(e) => {
                self.publish(lineage, QuoteState::Idle);
                return Err(e);
            }
        };

        let slippage_bps = intent.effective_slippage_bps();
        if slippage_bps != intent.slippage_bps {
            warn!(requested = intent.slippage_bps, used = slippage_bps, "Slippage clamped");
        }

        tokio::time::sleep(self.inner.debounce).await;
        if !self.is_latest(lineage) {
            debug!(lineage, "Superseded during debounce");
            return Err(AppError::Superseded);
        }

        let request = QuoteRequest {
            input_mint: intent.source.address,
            output_mint: intent.destination.address,
            amount,
            slippage_bps,
        };

        match self.inner.source.quote(&request).await {
            Ok(response) => {
                let quote = Quote {
                    lineage,
                    intent,
                    response,
                    received_at: now_utc(),
                };
                if !self.publish(lineage, QuoteState::Ready(quote.clone())) {
                    return Err(AppError::Superseded);
                }
                info!(
                    out_amount = quote.out_amount(),
                    price_impact = quote.price_impact_pct(),
                    "Quote ready"
                );
                Ok(quote)
            }
            Err(e) => {
                let state = match &e {
                    AppError::NoRoute(msg) => QuoteState::NoRoute(msg.clone()),
                    other => QuoteState::Failed(other.user_message()),
                };
                if !self.publish(lineage, state) {
                    return Err(AppError::Superseded);
                }
                warn!("Quote failed: {}", e);
                Err(e)
            }
        }
    }

    /// Start a new lineage for `intent` and clear the displayed quote.
    fn begin(&self, intent: &TradeIntent) -> u64 {
        let mut lineage = self.inner.lineage.lock();
        lineage.generation += 1;
        lineage.intent = Some(intent.clone());
        self.inner.state.send_replace(QuoteState::Loading);
        lineage.generation
    }

    fn is_latest(&self, lineage: u64) -> bool {
        self.inner.lineage.lock().generation == lineage
    }

    /// Publish `state` if `lineage` is still the latest. Returns false otherwise.
    fn publish(&self, lineage: u64, state: QuoteState) -> bool {
        let current = self.inner.lineage.lock();
        if current.generation != lineage {
            debug!(lineage, latest = current.generation, "Dropping late quote result");
            return false;
        }
        self.inner.state.send_replace(state);
        true
    }
}
