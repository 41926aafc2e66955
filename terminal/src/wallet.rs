//! # Keypair Wallet
//!
//! A local keypair file acting as the swap engine's wallet. Every signing
//! request goes through an approval callback first; the CLI asks on stdin.
//!
//! Supported keypair formats:
//! - JSON byte array (Solana CLI `id.json`, 64 bytes, or a bare 32-byte secret)
//! - Base58 string of the same bytes

use async_trait::async_trait;
use lib_solana::ConnectionHandle;
use lib_swap::{WalletAdapter, WalletError};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Decides whether a transaction described by the summary may be signed.
pub type Approval = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Keypair loading errors
#[derive(Debug, Error)]
pub enum KeypairError {
    #[error("Failed to read keypair file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid keypair: {0}")]
    Invalid(String),
}

pub struct KeypairWallet {
    keypair: Option<Keypair>,
    approval: Approval,
}

impl KeypairWallet {
    /// Wallet signing with `keypair` after asking on stdin.
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair: Some(keypair),
            approval: Arc::new(prompt_approval),
        }
    }

    /// Wallet without a key; signing fails with `NotConnected`.
    pub fn disconnected() -> Self {
        Self {
            keypair: None,
            approval: Arc::new(|_| false),
        }
    }

    pub fn with_approval(mut self, approval: Approval) -> Self {
        self.approval = approval;
        self
    }

    /// Approve every request without asking.
    pub fn auto_approve(self) -> Self {
        self.with_approval(Arc::new(|_| true))
    }
}

#[async_trait]
impl WalletAdapter for KeypairWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|k| k.pubkey())
    }

    async fn sign_and_send(
        &self,
        transaction: VersionedTransaction,
        connection: &ConnectionHandle,
    ) -> Result<Signature, WalletError> {
        let keypair = self.keypair.as_ref().ok_or(WalletError::NotConnected)?;

        let summary = describe(&transaction, connection.endpoint());
        let approve = Arc::clone(&self.approval);
        let approved = tokio::task::spawn_blocking(move || approve(&summary))
            .await
            .map_err(|e| WalletError::Signing(format!("Approval prompt failed: {}", e)))?;
        if !approved {
            info!("Signing request declined");
            return Err(WalletError::Declined);
        }

        let signed = VersionedTransaction::try_new(transaction.message, &[keypair])
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        debug!(endpoint = %connection.endpoint(), "Transaction signed");

        connection
            .rpc()
            .send_transaction(&signed)
            .await
            .map_err(|e| WalletError::Send(e.to_string()))
    }
}

fn describe(transaction: &VersionedTransaction, endpoint: &str) -> String {
    let payer = transaction
        .message
        .static_account_keys()
        .first()
        .map(|k| k.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Swap transaction: {} instruction(s), fee payer {}, via {}",
        transaction.message.instructions().len(),
        payer,
        endpoint
    )
}

/// Ask on stdin; anything but `y`/`yes` declines.
pub fn prompt_approval(summary: &str) -> bool {
    print!("{}\nSign and send? [y/N] ", summary);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    if io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// region: --- Keypair loading

/// `WALLET_KEYPAIR_PATH`, falling back to the Solana CLI default.
pub fn default_keypair_path() -> PathBuf {
    if let Ok(path) = std::env::var("WALLET_KEYPAIR_PATH") {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config").join("solana").join("id.json")
}

pub fn load_keypair(path: &Path) -> Result<Keypair, KeypairError> {
    let contents = fs::read_to_string(path).map_err(|source| KeypairError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_keypair(&contents)
}

pub fn parse_keypair(contents: &str) -> Result<Keypair, KeypairError> {
    let contents = contents.trim();
    let bytes: Vec<u8> = if contents.starts_with('[') {
        serde_json::from_str(contents).map_err(|e| KeypairError::Invalid(format!("Invalid JSON format: {}", e)))?
    } else {
        bs58::decode(contents)
            .into_vec()
            .map_err(|e| KeypairError::Invalid(format!("Invalid base58: {}", e)))?
    };

    match bytes.len() {
        32 => Ok(Keypair::new_from_array(secret(&bytes))),
        64 => {
            let keypair = Keypair::new_from_array(secret(&bytes[..32]));
            if keypair.pubkey().to_bytes()[..] != bytes[32..] {
                return Err(KeypairError::Invalid(
                    "Public key does not match the secret key".to_string(),
                ));
            }
            Ok(keypair)
        }
        n => Err(KeypairError::Invalid(format!("Expected 32 or 64 bytes, got {}", n))),
    }
}

fn secret(bytes: &[u8]) -> [u8; 32] {
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes[..32]);
    arr
}

// endregion: --- Keypair loading

#[cfg(test)]
mod tests {
    use super::*;
    use lib_solana::mock::MockConnector;
    use lib_solana::ConnectionManager;
    use solana_sdk::message::Message;
    use solana_sdk::transaction::Transaction;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const URL: &str = "https://rpc.test";

    fn keypair_bytes() -> [u8; 64] {
        Keypair::new_from_array([7u8; 32]).to_bytes()
    }

    async fn connected() -> (Arc<ConnectionHandle>, Arc<lib_solana::mock::MockRpc>) {
        let connector = Arc::new(MockConnector::new());
        let rpc = connector.endpoint(URL);
        let manager = ConnectionManager::new(vec![URL.to_string()], connector, Duration::from_secs(1));
        (manager.auto_reconnect().await.unwrap(), rpc)
    }

    fn unsigned_for(payer: &Pubkey) -> VersionedTransaction {
        VersionedTransaction::from(Transaction::new_unsigned(Message::new(&[], Some(payer))))
    }

    #[test]
    fn test_parse_cli_json_keypair() {
        let bytes = keypair_bytes();
        let json = serde_json::to_string(&bytes.to_vec()).unwrap();

        let keypair = parse_keypair(&json).unwrap();

        assert_eq!(keypair.to_bytes(), bytes);
    }

    #[test]
    fn test_parse_base58_and_bare_secret() {
        let bytes = keypair_bytes();
        let full = parse_keypair(&bs58::encode(bytes).into_string()).unwrap();
        let bare = parse_keypair(&bs58::encode(&bytes[..32]).into_string()).unwrap();

        assert_eq!(full.pubkey(), bare.pubkey());
    }

    #[test]
    fn test_parse_rejects_bad_keypairs() {
        let mut bytes = keypair_bytes();
        bytes[63] ^= 0xff;
        let mismatched = serde_json::to_string(&bytes.to_vec()).unwrap();

        assert!(matches!(parse_keypair(&mismatched), Err(KeypairError::Invalid(_))));
        assert!(matches!(parse_keypair("[1,2,3]"), Err(KeypairError::Invalid(_))));
        assert!(matches!(parse_keypair("not-base58-0OIl"), Err(KeypairError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_declined_request_is_not_sent() {
        let (handle, rpc) = connected().await;
        let wallet = KeypairWallet::new(Keypair::new_from_array([7u8; 32])).with_approval(Arc::new(|_| false));
        let tx = unsigned_for(&wallet.public_key().unwrap());

        let err = wallet.sign_and_send(tx, &handle).await.unwrap_err();

        assert!(matches!(err, WalletError::Declined));
        assert!(rpc.sent().is_empty());
    }

    #[tokio::test]
    async fn test_approved_request_is_signed_and_sent() {
        let (handle, rpc) = connected().await;
        let prompts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&prompts);
        let wallet = KeypairWallet::new(Keypair::new_from_array([7u8; 32])).with_approval(Arc::new(move |summary| {
            assert!(summary.contains(URL));
            seen.fetch_add(1, Ordering::SeqCst);
            true
        }));
        let tx = unsigned_for(&wallet.public_key().unwrap());

        let signature = wallet.sign_and_send(tx, &handle).await.unwrap();

        let sent = rpc.sent();
        assert_eq!(prompts.load(Ordering::SeqCst), 1);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].signatures[0], signature);
        assert_ne!(signature, Signature::default());
    }

    #[tokio::test]
    async fn test_disconnected_wallet() {
        let (handle, _rpc) = connected().await;
        let wallet = KeypairWallet::disconnected();

        assert!(wallet.public_key().is_none());
        let tx = unsigned_for(&Pubkey::new_unique());
        assert!(matches!(
            wallet.sign_and_send(tx, &handle).await,
            Err(WalletError::NotConnected)
        ));
    }
}
