//! # Utilities Library
//!
//! Shared helpers for environment variables, base64 payloads, time, amount
//! units, and input validation.

pub mod b64;
pub mod envs;
pub mod time;
pub mod units;
pub mod validation;

// Re-export commonly used functions
pub use b64::{b64_decode, b64_encode};
pub use envs::{get_env_list, get_env_or, get_env_parse_or};
pub use time::now_utc;
pub use units::{to_base_units, to_display_units};
pub use validation::{validate_not_empty, validate_positive_finite};
