//! # Centralized Error Handling
//!
//! This module defines the error type [`AppError`] used across the swap engine.
//! It follows the `thiserror` pattern for ergonomic error handling.
//!
//! ## Error Categories
//!
//! 1. **Connectivity** - RPC endpoints or the quote service could not be reached
//!    - [`Connectivity`](AppError::Connectivity) is retryable by the caller
//!    - [`Rpc`](AppError::Rpc) wraps an individual RPC call failure
//!
//! 2. **Quoting** - The aggregator answered but cannot serve the trade
//!    - [`NoRoute`](AppError::NoRoute) is shown inline next to the amount input
//!    - [`QuoteService`](AppError::QuoteService) for any other non-success answer
//!
//! 3. **Ordering** - Results that lost a race against a newer intent
//!    - [`Superseded`](AppError::Superseded) and [`StaleQuote`](AppError::StaleQuote)
//!      are dropped by the session and never reach the user
//!
//! 4. **Wallet / Submission**
//!    - [`UserDeclined`](AppError::UserDeclined) is reported without a retry prompt
//!    - [`ConfirmationUnknown`](AppError::ConfirmationUnknown) carries an explorer
//!      link so the user can verify the outcome independently
//!
//! ## Usage Example
//!
//! ```rust
//! use lib_core::error::{AppError, Result};
//!
//! fn parse_slippage(bps: u16) -> Result<u16> {
//!     if bps == 0 {
//!         return Err(AppError::InvalidInput("Slippage must be positive".to_string()));
//!     }
//!     Ok(bps)
//! }
//! ```

use thiserror::Error;

/// Convenience type alias for `Result<T, AppError>`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Error type covering every failure the swap engine can report.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error during startup or environment loading.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Every candidate RPC endpoint (or the quote service transport) was unreachable.
    ///
    /// Not retried automatically; the caller decides whether to try again.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// A single Solana RPC call failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The quoting service found no viable route for the trade.
    #[error("No route found: {0}")]
    NoRoute(String),

    /// The quoting service rejected the request for another reason.
    #[error("Quote service error: {0}")]
    QuoteService(String),

    /// A quote computed for an older trade intent was offered for submission.
    #[error("Quote is stale for the current trade intent")]
    StaleQuote,

    /// A debounced request was overtaken by a newer trade intent.
    #[error("Request superseded by a newer trade intent")]
    Superseded,

    /// No wallet is connected.
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// The user dismissed the wallet signing prompt.
    #[error("Transaction declined in wallet")]
    UserDeclined,

    /// Any other wallet failure (signing, broadcast).
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// The transaction executed on-chain and failed.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// The outcome of a submitted transaction could not be determined.
    #[error("Confirmation could not be verified for {signature}: {reason} (check {explorer_url})")]
    ConfirmationUnknown {
        signature: String,
        reason: String,
        explorer_url: String,
    },

    /// A swap is already being executed.
    #[error("A swap is already in progress")]
    SwapInProgress,

    /// Invalid user input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Data decoding error (base64, bincode, JSON).
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short, stable identifier for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "Config",
            AppError::Connectivity(_) => "Connectivity",
            AppError::Rpc(_) => "Rpc",
            AppError::NoRoute(_) => "NoRoute",
            AppError::QuoteService(_) => "QuoteService",
            AppError::StaleQuote => "StaleQuote",
            AppError::Superseded => "Superseded",
            AppError::WalletNotConnected => "WalletNotConnected",
            AppError::UserDeclined => "UserDeclined",
            AppError::Wallet(_) => "Wallet",
            AppError::Transaction(_) => "Transaction",
            AppError::ConfirmationUnknown { .. } => "ConfirmationUnknown",
            AppError::SwapInProgress => "SwapInProgress",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Decoding(_) => "Decoding",
            AppError::Internal(_) => "Internal",
        }
    }

    /// Whether trying the same operation again later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Connectivity(_) | AppError::Rpc(_))
    }

    /// Whether the presentation layer should show this error at all.
    ///
    /// Ordering errors are internal bookkeeping.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, AppError::Superseded | AppError::StaleQuote)
    }

    /// Get a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Connectivity(_) | AppError::Rpc(_) => {
                "Could not reach the Solana network. Check your connection or pick another RPC endpoint.".to_string()
            }
            AppError::NoRoute(_) => "No route found for this swap and amount.".to_string(),
            AppError::QuoteService(_) => "The quote service is unavailable right now.".to_string(),
            AppError::WalletNotConnected => "Connect a wallet first.".to_string(),
            AppError::UserDeclined => "Transaction was declined in the wallet.".to_string(),
            AppError::Wallet(msg) => format!("Wallet error: {}", msg),
            AppError::Transaction(msg) => format!("Transaction failed: {}", msg),
            AppError::ConfirmationUnknown { explorer_url, .. } => format!(
                "The transaction was sent but its confirmation could not be verified. Check {}",
                explorer_url
            ),
            AppError::SwapInProgress => "A swap is already in progress.".to_string(),
            AppError::InvalidInput(msg) => msg.clone(),
            AppError::StaleQuote | AppError::Superseded => String::new(),
            AppError::Config(_) | AppError::Decoding(_) | AppError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

/// Convert `serde_json::Error` to `AppError`.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Decoding(format!("JSON error: {}", err))
    }
}

impl From<lib_utils::units::Error> for AppError {
    fn from(err: lib_utils::units::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<lib_utils::b64::Error> for AppError {
    fn from(err: lib_utils::b64::Error) -> Self {
        AppError::Decoding(err.to_string())
    }
}

impl From<lib_utils::envs::Error> for AppError {
    fn from(err: lib_utils::envs::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_connectivity_is_retryable() {
        assert!(AppError::Connectivity("all endpoints down".into()).is_retryable());
        assert!(AppError::Rpc("timeout".into()).is_retryable());
        assert!(!AppError::NoRoute("none".into()).is_retryable());
        assert!(!AppError::UserDeclined.is_retryable());
    }

    #[test]
    fn test_ordering_errors_are_hidden() {
        assert!(!AppError::Superseded.is_user_visible());
        assert!(!AppError::StaleQuote.is_user_visible());
        assert!(AppError::NoRoute("none".into()).is_user_visible());
    }

    #[test]
    fn test_confirmation_unknown_mentions_explorer() {
        let err = AppError::ConfirmationUnknown {
            signature: "5abc".into(),
            reason: "rpc dropped".into(),
            explorer_url: "https://solana.fm/tx/5abc?cluster=mainnet-beta".into(),
        };
        assert!(err.user_message().contains("https://solana.fm/tx/5abc"));
        assert_eq!(err.code(), "ConfirmationUnknown");
    }

    #[test]
    fn test_unit_errors_become_invalid_input() {
        let err: AppError = lib_utils::units::Error::BelowSmallestUnit.into();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
