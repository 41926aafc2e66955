//! # Application Configuration
//!
//! This module manages configuration loaded from environment variables.
//! All configuration is validated on startup to fail fast if misconfigured.
//!
//! ## Global Config Access
//!
//! Use [`core_config()`] to access the global configuration instance:
//!
//! ```rust,no_run
//! use lib_core::config::{core_config, init_config};
//!
//! init_config()?;
//! let config = core_config()?;
//! let endpoints = &config.rpc_endpoints;
//! # Ok::<(), lib_core::AppError>(())
//! ```
//!
//! Components take a `&Config` (or the individual values) explicitly, so
//! tests build one with [`Config::default()`] instead of touching the global.

use crate::error::{AppError, Result};
use lib_utils::envs::{get_env_list, get_env_or, get_env_parse_or};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_RPC_MAINNET_1: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_RPC_MAINNET_2: &str = "https://solana-api.projectserum.com";
const DEFAULT_RPC_DEVNET: &str = "https://api.devnet.solana.com";
const DEFAULT_JUPITER_API_BASE: &str = "https://quote-api.jup.ag/v6";
const DEFAULT_TOKEN_LIST_URL: &str = "https://token.jup.ag/strict";
const DEFAULT_EXPLORER_TX_URL: &str = "https://solana.fm/tx/{signature}?cluster={cluster}";

/// Upper bound on slippage tolerance (50%).
pub const MAX_SLIPPAGE_BPS: u16 = 5_000;

/// Finality level requested for balance and confirmation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl FromStr for Commitment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(AppError::Config(format!("Unknown commitment level: {}", other))),
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Swap engine configuration loaded from environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    /// Ordered RPC endpoints tried by auto-reconnect
    pub rpc_endpoints: Vec<String>,

    /// Cluster name used in explorer links (`mainnet-beta`, `devnet`)
    pub cluster: String,

    /// Jupiter swap API base (quote and swap endpoints)
    pub jupiter_api_base: String,

    /// Jupiter strict token list URL
    pub token_list_url: String,

    /// Optional Jupiter API key, sent as `x-api-key`
    pub jupiter_api_key: Option<String>,

    /// Transport timeout for Jupiter requests
    pub jupiter_timeout: Duration,

    /// Quiet period before a quote request is issued
    pub quote_debounce: Duration,

    /// Bounded timeout for an RPC liveness check
    pub rpc_health_timeout: Duration,

    /// Timeout for every other RPC request
    pub rpc_request_timeout: Duration,

    /// Period of the background balance refresh
    pub balance_refresh_interval: Duration,

    /// Slippage used when the user has not chosen one
    pub default_slippage_bps: u16,

    /// Commitment for balances and confirmations
    pub commitment: Commitment,

    /// Delay between signature status polls
    pub confirmation_poll_interval: Duration,

    /// Give up waiting for a terminal status after this long
    pub confirmation_timeout: Duration,

    /// Explorer template with `{signature}` and `{cluster}` placeholders
    pub explorer_tx_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_endpoints: vec![
                DEFAULT_RPC_MAINNET_1.to_string(),
                DEFAULT_RPC_MAINNET_2.to_string(),
                DEFAULT_RPC_DEVNET.to_string(),
            ],
            cluster: "mainnet-beta".to_string(),
            jupiter_api_base: DEFAULT_JUPITER_API_BASE.to_string(),
            token_list_url: DEFAULT_TOKEN_LIST_URL.to_string(),
            jupiter_api_key: None,
            jupiter_timeout: Duration::from_secs(10),
            quote_debounce: Duration::from_millis(500),
            rpc_health_timeout: Duration::from_millis(5_000),
            rpc_request_timeout: Duration::from_secs(30),
            balance_refresh_interval: Duration::from_secs(15),
            default_slippage_bps: 50,
            commitment: Commitment::Confirmed,
            confirmation_poll_interval: Duration::from_millis(1_000),
            confirmation_timeout: Duration::from_secs(90),
            explorer_tx_url: DEFAULT_EXPLORER_TX_URL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `SOLANA_RPC_URLS` (comma separated) wins over the three individual
    /// `SOLANA_RPC_URL_*` variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let rpc_endpoints = get_env_list("SOLANA_RPC_URLS").unwrap_or_else(|| {
            vec![
                get_env_or("SOLANA_RPC_URL_MAINNET_1", DEFAULT_RPC_MAINNET_1),
                get_env_or("SOLANA_RPC_URL_MAINNET_2", DEFAULT_RPC_MAINNET_2),
                get_env_or("SOLANA_RPC_URL_DEVNET", DEFAULT_RPC_DEVNET),
            ]
        });

        let jupiter_api_key = std::env::var("JUPITER_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let commitment = get_env_or("COMMITMENT", "confirmed").parse()?;

        Ok(Self {
            rpc_endpoints,
            cluster: get_env_or("SOLANA_CLUSTER", &defaults.cluster),
            jupiter_api_base: get_env_or("JUPITER_API_BASE", &defaults.jupiter_api_base),
            token_list_url: get_env_or("JUPITER_TOKEN_LIST_URL", &defaults.token_list_url),
            jupiter_api_key,
            jupiter_timeout: Duration::from_secs(get_env_parse_or("JUPITER_TIMEOUT_SECS", 10u64)?),
            quote_debounce: Duration::from_millis(get_env_parse_or("QUOTE_DEBOUNCE_MS", 500u64)?),
            rpc_health_timeout: Duration::from_millis(get_env_parse_or("RPC_HEALTH_TIMEOUT_MS", 5_000u64)?),
            rpc_request_timeout: Duration::from_secs(get_env_parse_or("RPC_TIMEOUT_SECS", 30u64)?),
            balance_refresh_interval: Duration::from_secs(get_env_parse_or("BALANCE_REFRESH_SECS", 15u64)?),
            default_slippage_bps: get_env_parse_or("DEFAULT_SLIPPAGE_BPS", defaults.default_slippage_bps)?,
            commitment,
            confirmation_poll_interval: Duration::from_millis(get_env_parse_or("CONFIRMATION_POLL_MS", 1_000u64)?),
            confirmation_timeout: Duration::from_secs(get_env_parse_or("CONFIRMATION_TIMEOUT_SECS", 90u64)?),
            explorer_tx_url: get_env_or("EXPLORER_TX_URL", &defaults.explorer_tx_url),
        })
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.rpc_endpoints.is_empty() {
            return Err(AppError::Config("At least one RPC endpoint must be configured".to_string()));
        }

        if let Some(bad) = self
            .rpc_endpoints
            .iter()
            .find(|url| !(url.starts_with("http://") || url.starts_with("https://")))
        {
            return Err(AppError::Config(format!("RPC endpoint must be an http(s) URL: {}", bad)));
        }

        if self.default_slippage_bps == 0 || self.default_slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(AppError::Config(format!(
                "DEFAULT_SLIPPAGE_BPS must be between 1 and {}",
                MAX_SLIPPAGE_BPS
            )));
        }

        if self.rpc_health_timeout.is_zero() {
            return Err(AppError::Config("RPC_HEALTH_TIMEOUT_MS must be greater than 0".to_string()));
        }

        if self.rpc_request_timeout.is_zero() {
            return Err(AppError::Config("RPC_TIMEOUT_SECS must be greater than 0".to_string()));
        }

        if self.balance_refresh_interval.is_zero() || self.confirmation_poll_interval.is_zero() {
            return Err(AppError::Config("Refresh and poll intervals must be greater than 0".to_string()));
        }

        if !self.explorer_tx_url.contains("{signature}") {
            return Err(AppError::Config("EXPLORER_TX_URL must contain {signature}".to_string()));
        }

        Ok(())
    }

    /// Explorer link for a transaction signature.
    pub fn explorer_url(&self, signature: &str) -> String {
        self.explorer_tx_url
            .replace("{signature}", signature)
            .replace("{cluster}", &self.cluster)
    }
}

/// Global configuration instance (initialized once at startup).
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Initialize the global configuration from the environment (and `.env`).
///
/// # Errors
///
/// Returns an error if:
/// - Environment variables are invalid
/// - Configuration validation fails
/// - Config has already been initialized
pub fn init_config() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!(
        endpoints = config.rpc_endpoints.len(),
        cluster = %config.cluster,
        commitment = %config.commitment,
        "Configuration loaded"
    );

    CONFIG
        .set(config)
        .map_err(|_| AppError::Config("Config has already been initialized".to_string()))
}

/// Get a reference to the global configuration.
pub fn core_config() -> Result<&'static Config> {
    CONFIG
        .get()
        .ok_or_else(|| AppError::Config("Config must be initialized with init_config() before use".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rpc_endpoints.len(), 3);
        assert_eq!(config.quote_debounce, Duration::from_millis(500));
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert_eq!(config.rpc_request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_request_timeout_is_rejected() {
        let config = Config {
            rpc_request_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_empty_endpoint_list_is_rejected() {
        let config = Config {
            rpc_endpoints: vec![],
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_slippage_bounds() {
        let too_high = Config {
            default_slippage_bps: 5_001,
            ..Config::default()
        };
        assert!(too_high.validate().is_err());

        let zero = Config {
            default_slippage_bps: 0,
            ..Config::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_explorer_url() {
        let config = Config {
            cluster: "devnet".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.explorer_url("5sig"),
            "https://solana.fm/tx/5sig?cluster=devnet"
        );
    }

    #[test]
    fn test_commitment_parsing() {
        assert_eq!("Finalized".parse::<Commitment>().unwrap(), Commitment::Finalized);
        assert_eq!(" processed ".parse::<Commitment>().unwrap(), Commitment::Processed);
        assert!("recent".parse::<Commitment>().is_err());
        assert_eq!(Commitment::Confirmed.to_string(), "confirmed");
    }
}
