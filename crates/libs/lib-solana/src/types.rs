//! # Asset Types
//!
//! Tradeable assets as the swap engine sees them: a mint address, a symbol for
//! display, and the decimal precision used to move between human amounts and
//! base units.
//!
//! Native SOL is identified by its wrapped mint address. Symbols are display
//! text only and never decide how a balance is read.

use lib_core::Result;
use lib_utils::units::{to_base_units, to_display_units};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

/// Wrapped SOL mint. An asset with this address is the native asset.
pub const NATIVE_MINT: Pubkey = Pubkey::from_str_const("So11111111111111111111111111111111111111112");

/// Decimals of the native asset (1 SOL = 10^9 lamports).
pub const NATIVE_DECIMALS: u8 = 9;

/// A tradeable asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Asset {
    pub address: Pubkey,
    pub symbol: String,
    pub decimals: u8,
    pub name: Option<String>,
}

impl Asset {
    pub fn new(address: Pubkey, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            decimals,
            name: None,
        }
    }

    /// The native asset (SOL).
    pub fn native() -> Self {
        Self {
            address: NATIVE_MINT,
            symbol: "SOL".to_string(),
            decimals: NATIVE_DECIMALS,
            name: Some("Wrapped SOL".to_string()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True when the balance lives in the owner's system account rather
    /// than in an associated token account.
    pub fn is_native(&self) -> bool {
        self.address == NATIVE_MINT
    }

    /// Convert a human amount into base units of this asset.
    pub fn to_base_units(&self, amount: f64) -> Result<u64> {
        Ok(to_base_units(amount, self.decimals)?)
    }

    pub fn to_display_units(&self, raw: u64) -> f64 {
        to_display_units(raw, self.decimals)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.symbol, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_is_decided_by_address() {
        assert!(Asset::native().is_native());

        // A token that calls itself "SOL" is still an SPL token.
        let impostor = Asset::new(Pubkey::new_unique(), "SOL", 9);
        assert!(!impostor.is_native());

        let renamed = Asset::new(NATIVE_MINT, "wSOL", 9);
        assert!(renamed.is_native());
    }

    #[test]
    fn test_base_unit_conversion_uses_asset_decimals() {
        let usdc = Asset::new(Pubkey::new_unique(), "USDC", 6);
        assert_eq!(usdc.to_base_units(2.5).unwrap(), 2_500_000);
        assert_eq!(usdc.to_display_units(1_250_000), 1.25);
        assert!(usdc.to_base_units(0.0000001).is_err());
    }
}
