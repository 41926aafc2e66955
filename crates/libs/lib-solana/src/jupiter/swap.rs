//! # Jupiter Swap Transaction Building
//!
//! Swap transaction building from Jupiter quotes.

use super::client::JupiterHttpClient;
use super::types::{QuoteResponse, SwapRequest, SwapTransactionResponse};
use lib_core::{AppError, Result};
use lib_utils::b64::b64_decode;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use tracing::debug;

impl JupiterHttpClient {
    /// Build an unsigned swap transaction from a quote
    pub async fn get_swap_transaction(
        &self,
        quote_response: &QuoteResponse,
        user_public_key: &Pubkey,
    ) -> Result<SwapTransactionResponse> {
        let url = format!("{}/swap", self.api_base);

        let request_body = SwapRequest {
            quote_response: &quote_response.raw,
            user_public_key: user_public_key.to_string(),
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: "auto",
        };

        debug!("Jupiter swap transaction request for user: {}", user_public_key);

        let body = self
            .send(
                "Jupiter swap transaction request failed",
                self.http.post(&url).json(&request_body),
            )
            .await?;

        let swap_response: SwapTransactionResponse = serde_json::from_str(&body)?;

        debug!(
            last_valid_block_height = swap_response.last_valid_block_height,
            "Jupiter swap transaction received"
        );

        Ok(swap_response)
    }
}

impl SwapTransactionResponse {
    /// Decode the base64 payload into a versioned transaction.
    pub fn decode_transaction(&self) -> Result<VersionedTransaction> {
        decode_swap_transaction(&self.swap_transaction)
    }
}

/// Decode a base64 + bincode versioned transaction.
pub fn decode_swap_transaction(encoded: &str) -> Result<VersionedTransaction> {
    let bytes = b64_decode(encoded.trim())?;
    bincode::deserialize(&bytes)
        .map_err(|e| AppError::Decoding(format!("Failed to deserialize swap transaction: {}", e)))
}
