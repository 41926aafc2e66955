//! # Wallet Adapter
//!
//! The engine never holds keys. Signing and broadcasting are delegated to a
//! [`WalletAdapter`], which may ask the user for approval.

use async_trait::async_trait;
use lib_core::AppError;
use lib_solana::ConnectionHandle;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

/// Wallet failures
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    /// The user rejected the signing request.
    #[error("User declined the transaction")]
    Declined,

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Send error: {0}")]
    Send(String),
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::NotConnected => AppError::WalletNotConnected,
            WalletError::Declined => AppError::UserDeclined,
            WalletError::Signing(msg) | WalletError::Send(msg) => AppError::Wallet(msg),
        }
    }
}

/// Connection state of a wallet
#[derive(Debug, Clone, PartialEq)]
pub enum WalletStatus {
    Disconnected,
    Connected(Pubkey),
}

/// Signing capability supplied by the host application.
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Public key of the connected account, `None` when disconnected.
    fn public_key(&self) -> Option<Pubkey>;

    fn status(&self) -> WalletStatus {
        match self.public_key() {
            Some(key) => WalletStatus::Connected(key),
            None => WalletStatus::Disconnected,
        }
    }

    /// Sign `transaction` and submit it through `connection`.
    async fn sign_and_send(
        &self,
        transaction: VersionedTransaction,
        connection: &ConnectionHandle,
    ) -> Result<Signature, WalletError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decline_maps_to_user_declined() {
        assert!(matches!(AppError::from(WalletError::Declined), AppError::UserDeclined));
        assert!(matches!(
            AppError::from(WalletError::Send("blockhash not found".into())),
            AppError::Wallet(_)
        ));
    }
}
