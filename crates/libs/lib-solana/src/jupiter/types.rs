//! # Jupiter API Types
//!
//! Type definitions for Jupiter Aggregator API requests and responses.

use crate::types::Asset;
use lib_core::{AppError, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Parameters of a `GET /quote` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Input amount in base units of the input mint
    pub amount: u64,
    pub slippage_bps: u16,
}

/// Quote returned by Jupiter.
///
/// `raw` is the response body exactly as received; it is echoed back to
/// `POST /swap` untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResponse {
    pub input_mint: String,
    pub output_mint: String,
    pub in_amount: u64,
    pub out_amount: u64,
    /// Price impact as a fraction (0.01 = 1%)
    pub price_impact_pct: f64,
    pub slippage_bps: u16,
    pub route_plan: Vec<RoutePlanStep>,
    pub raw: serde_json::Value,
}

impl QuoteResponse {
    /// AMM labels along the route, in order.
    pub fn route_labels(&self) -> Vec<String> {
        self.route_plan
            .iter()
            .map(|step| {
                step.swap_info
                    .label
                    .clone()
                    .unwrap_or_else(|| step.swap_info.amm_key.clone())
            })
            .collect()
    }
}

/// Wire shape of the quote body. Amounts arrive as decimal strings.
#[derive(Debug, Deserialize)]
pub(crate) struct QuoteResponseWire {
    #[serde(rename = "inputMint")]
    pub input_mint: String,
    #[serde(rename = "outputMint")]
    pub output_mint: String,
    #[serde(rename = "inAmount")]
    pub in_amount: String,
    #[serde(rename = "outAmount")]
    pub out_amount: String,
    #[serde(rename = "priceImpactPct", default)]
    pub price_impact_pct: Option<NumberOrString>,
    #[serde(rename = "slippageBps", default)]
    pub slippage_bps: u16,
    #[serde(rename = "routePlan", default)]
    pub route_plan: Vec<RoutePlanStep>,
}

/// Jupiter has sent `priceImpactPct` both as a number and as a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    pub fn as_f64(&self) -> Result<f64> {
        match self {
            NumberOrString::Number(n) => Ok(*n),
            NumberOrString::String(s) => s
                .trim()
                .parse()
                .map_err(|_| AppError::Decoding(format!("Invalid number: {}", s))),
        }
    }
}

/// A step in Jupiter's routing plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlanStep {
    #[serde(rename = "swapInfo")]
    pub swap_info: SwapInfo,
    #[serde(default)]
    pub percent: u8,
}

/// Details about a single swap operation within a route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapInfo {
    #[serde(rename = "ammKey")]
    pub amm_key: String,
    pub label: Option<String>,
    #[serde(rename = "inputMint")]
    pub input_mint: String,
    #[serde(rename = "outputMint")]
    pub output_mint: String,
    #[serde(rename = "inAmount")]
    pub in_amount: String,
    #[serde(rename = "outAmount")]
    pub out_amount: String,
    #[serde(rename = "feeAmount", default)]
    pub fee_amount: Option<String>,
    #[serde(rename = "feeMint", default)]
    pub fee_mint: Option<String>,
}

/// Body of `POST /swap`.
#[derive(Debug, Serialize)]
pub struct SwapRequest<'a> {
    #[serde(rename = "quoteResponse")]
    pub quote_response: &'a serde_json::Value,
    #[serde(rename = "userPublicKey")]
    pub user_public_key: String,
    #[serde(rename = "wrapAndUnwrapSol")]
    pub wrap_and_unwrap_sol: bool,
    #[serde(rename = "dynamicComputeUnitLimit")]
    pub dynamic_compute_unit_limit: bool,
    #[serde(rename = "prioritizationFeeLamports")]
    pub prioritization_fee_lamports: &'static str,
}

/// Response from Jupiter swap API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTransactionResponse {
    /// Base64-encoded serialized versioned transaction
    #[serde(rename = "swapTransaction")]
    pub swap_transaction: String,
    /// Block height after which transaction is invalid
    #[serde(rename = "lastValidBlockHeight", default)]
    pub last_valid_block_height: u64,
    /// Optional priority fee in lamports
    #[serde(rename = "prioritizationFeeLamports", default)]
    pub prioritization_fee_lamports: Option<u64>,
}

/// Error body returned on non-success statuses.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "errorCode", default)]
    pub error_code: Option<String>,
}

/// Token information from Jupiter token list
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    #[serde(rename = "logoURI", default)]
    pub logo_uri: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TokenInfo {
    pub fn to_asset(&self) -> Result<Asset> {
        let address = Pubkey::from_str(&self.address)
            .map_err(|e| AppError::Decoding(format!("Invalid mint {}: {}", self.address, e)))?;
        Ok(Asset::new(address, self.symbol.clone(), self.decimals).with_name(self.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NATIVE_MINT;

    #[test]
    fn test_token_info_to_asset() {
        let info: TokenInfo = serde_json::from_str(
            r#"{"address":"So11111111111111111111111111111111111111112","symbol":"SOL","name":"Wrapped SOL","decimals":9,"logoURI":null}"#,
        )
        .unwrap();
        let asset = info.to_asset().unwrap();
        assert_eq!(asset.address, NATIVE_MINT);
        assert!(asset.is_native());
        assert!(info.tags.is_empty());
    }

    #[test]
    fn test_swap_request_shape() {
        let quote = serde_json::json!({"inAmount": "1"});
        let body = serde_json::to_value(SwapRequest {
            quote_response: &quote,
            user_public_key: "user".to_string(),
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
            prioritization_fee_lamports: "auto",
        })
        .unwrap();

        assert_eq!(body["quoteResponse"]["inAmount"], "1");
        assert_eq!(body["wrapAndUnwrapSol"], true);
        assert_eq!(body["prioritizationFeeLamports"], "auto");
    }
}
