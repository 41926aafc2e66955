//! # Amount Units
//!
//! Conversion between human-readable amounts and integer base units
//! (`amount × 10^decimals`).

/// Largest decimal precision whose scale still fits in a `u64`.
pub const MAX_DECIMALS: u8 = 19;

/// Convert a human-readable amount into integer base units.
///
/// The amount is rendered with exactly `decimals` fractional digits, so
/// `1.5` with 9 decimals becomes `1_500_000_000` without float drift.
/// Amounts smaller than one base unit are rejected rather than rounded to zero.
pub fn to_base_units(amount: f64, decimals: u8) -> Result<u64, Error> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::NotPositive);
    }
    if decimals > MAX_DECIMALS {
        return Err(Error::UnsupportedDecimals(decimals));
    }

    let scaled = amount * 10f64.powi(decimals as i32);
    // Float noise around exactly one unit (e.g. 1e-9 * 1e9) must still pass.
    if scaled < 1.0 && 1.0 - scaled > 1e-6 {
        return Err(Error::BelowSmallestUnit);
    }

    let rendered = format!("{:.*}", decimals as usize, amount);
    let digits: String = rendered.chars().filter(|c| *c != '.').collect();
    let base = digits.parse::<u64>().map_err(|_| Error::Overflow)?;

    if base == 0 {
        return Err(Error::BelowSmallestUnit);
    }
    Ok(base)
}

/// Convert integer base units into a display amount.
pub fn to_display_units(raw: u64, decimals: u8) -> f64 {
    raw as f64 / 10f64.powi(decimals as i32)
}

// region:    --- Error
#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    NotPositive,
    BelowSmallestUnit,
    Overflow,
    UnsupportedDecimals(u8),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::NotPositive => write!(fmt, "amount must be a finite number greater than 0"),
            Error::BelowSmallestUnit => write!(fmt, "amount is below the smallest unit of the asset"),
            Error::Overflow => write!(fmt, "amount is too large"),
            Error::UnsupportedDecimals(d) => write!(fmt, "unsupported decimal precision: {d}"),
        }
    }
}

impl std::error::Error for Error {}
// endregion: --- Error
