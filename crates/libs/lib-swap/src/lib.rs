//! # Swap Library
//!
//! Swap orchestration on top of `lib-solana`: debounced quoting, execution
//! through a wallet adapter, and the [`SwapSession`] front ends talk to.

// region: --- Modules
pub mod executor;
pub mod quote_engine;
pub mod session;
pub mod wallet;

#[cfg(test)]
mod mock;
// endregion: --- Modules

pub use executor::SwapExecutor;
pub use quote_engine::{Quote, QuoteEngine, QuoteState, TradeIntent};
pub use session::SwapSession;
pub use wallet::{WalletAdapter, WalletError, WalletStatus};
