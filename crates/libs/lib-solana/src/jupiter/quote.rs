//! # Jupiter Quote API
//!
//! Quote API integration for getting swap quotes from Jupiter.

use super::client::JupiterHttpClient;
use super::types::{QuoteRequest, QuoteResponse, QuoteResponseWire};
use lib_core::{AppError, Result};
use tracing::debug;

impl JupiterHttpClient {
    /// Get a swap quote from Jupiter Aggregator V6
    pub async fn get_swap_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        let url = format!("{}/quote", self.api_base);
        let query = [
            ("inputMint", request.input_mint.to_string()),
            ("outputMint", request.output_mint.to_string()),
            ("amount", request.amount.to_string()),
            ("slippageBps", request.slippage_bps.to_string()),
        ];

        debug!(
            input = %request.input_mint,
            output = %request.output_mint,
            amount = request.amount,
            slippage_bps = request.slippage_bps,
            "Jupiter swap quote request"
        );

        let body = self
            .send("Jupiter quote request failed", self.http.get(&url).query(&query))
            .await?;
        let quote = parse_quote(&body)?;

        debug!(
            "Jupiter quote: {} -> {} base units (impact: {:.4}%)",
            quote.in_amount,
            quote.out_amount,
            quote.price_impact_pct * 100.0
        );

        Ok(quote)
    }
}

/// Parse a successful quote body.
///
/// A body without any route step is a no-route answer even though the
/// transport succeeded.
pub(crate) fn parse_quote(body: &str) -> Result<QuoteResponse> {
    let raw: serde_json::Value = serde_json::from_str(body)?;
    let wire: QuoteResponseWire = serde_json::from_value(raw.clone())?;

    if wire.route_plan.is_empty() {
        return Err(AppError::NoRoute(format!(
            "No routes found for {} -> {}",
            wire.input_mint, wire.output_mint
        )));
    }

    let in_amount = parse_amount("inAmount", &wire.in_amount)?;
    let out_amount = parse_amount("outAmount", &wire.out_amount)?;
    let price_impact_pct = match &wire.price_impact_pct {
        Some(value) => value.as_f64()?,
        None => 0.0,
    };

    Ok(QuoteResponse {
        input_mint: wire.input_mint,
        output_mint: wire.output_mint,
        in_amount,
        out_amount,
        price_impact_pct,
        slippage_bps: wire.slippage_bps,
        route_plan: wire.route_plan,
        raw,
    })
}

fn parse_amount(field: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| AppError::Decoding(format!("Invalid {} in quote: {}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE_BODY: &str = r#"{
        "inputMint": "So11111111111111111111111111111111111111112",
        "inAmount": "1500000000",
        "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        "outAmount": "241380000",
        "otherAmountThreshold": "240173100",
        "swapMode": "ExactIn",
        "slippageBps": 50,
        "priceImpactPct": "0.0012",
        "routePlan": [{
            "swapInfo": {
                "ammKey": "58oQChx4yWmvKdwLLZzBi4ChoCc2fqCUWBkwMihLYQo2",
                "label": "Raydium",
                "inputMint": "So11111111111111111111111111111111111111112",
                "outputMint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                "inAmount": "1500000000",
                "outAmount": "241380000",
                "feeAmount": "3750000",
                "feeMint": "So11111111111111111111111111111111111111112"
            },
            "percent": 100
        }],
        "contextSlot": 250000000
    }"#;

    #[test]
    fn test_parse_quote() {
        let quote = parse_quote(QUOTE_BODY).unwrap();
        assert_eq!(quote.in_amount, 1_500_000_000);
        assert_eq!(quote.out_amount, 241_380_000);
        assert!((quote.price_impact_pct - 0.0012).abs() < 1e-12);
        assert_eq!(quote.route_labels(), vec!["Raydium".to_string()]);
        // Fields the engine does not model are still echoed to /swap.
        assert_eq!(quote.raw["otherAmountThreshold"], "240173100");
    }

    #[test]
    fn test_empty_route_plan_is_no_route() {
        let body = r#"{"inputMint":"A","outputMint":"B","inAmount":"1","outAmount":"0","priceImpactPct":0,"routePlan":[]}"#;
        assert!(matches!(parse_quote(body), Err(AppError::NoRoute(_))));

        let missing = r#"{"inputMint":"A","outputMint":"B","inAmount":"1","outAmount":"0"}"#;
        assert!(matches!(parse_quote(missing), Err(AppError::NoRoute(_))));
    }

    #[test]
    fn test_malformed_body_is_decoding_error() {
        assert!(matches!(parse_quote("<html>"), Err(AppError::Decoding(_))));
    }
}
