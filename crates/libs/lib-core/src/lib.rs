//! # Core Library
//!
//! Configuration and the error taxonomy shared by every swap-engine crate.

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Commitment, Config};
pub use error::{AppError, Result};
