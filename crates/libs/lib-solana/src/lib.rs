//! # Solana Library
//!
//! Solana side of the swap engine: the RPC seam, connection management with
//! failover, balances, the Jupiter client and transaction confirmation.

// region: --- Modules
pub mod balance;
pub mod client;
pub mod connection;
pub mod jupiter;
pub mod spl_token;
pub mod types;
pub mod watcher;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
// endregion: --- Modules

// Re-export commonly used types from root for convenience
pub use balance::{BalanceBook, BalanceRecord, BalanceService, BalanceState};
pub use client::{RpcConnector, RpcProvider, SolanaClient, SolanaConnector};
pub use connection::{ConnectionHandle, ConnectionManager, EndpointStatus, HealthStatus};
pub use jupiter::{JupiterClient, QuoteSource};
pub use types::{Asset, NATIVE_MINT};
pub use watcher::{FailureReason, PendingTransaction, TransactionStatus, TransactionUpdate, TransactionWatcher};
