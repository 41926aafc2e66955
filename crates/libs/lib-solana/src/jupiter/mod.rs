//! # Jupiter Aggregator Client
//!
//! Integration with Jupiter Aggregator for swap quotes, swap transactions and
//! the token list.
//!
//! The engine talks to Jupiter through the [`QuoteSource`] trait so quoting
//! and execution can be tested without the network.

// region: --- Modules
pub mod types;
pub mod client;
pub mod quote;
pub mod swap;
// endregion: --- Modules

pub use swap::decode_swap_transaction;
pub use types::{QuoteRequest, QuoteResponse, SwapTransactionResponse, TokenInfo};

use crate::types::Asset;
use async_trait::async_trait;
use client::JupiterHttpClient;
use lib_core::{AppError, Config, Result};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://quote-api.jup.ag/v6";
const DEFAULT_TOKEN_LIST_URL: &str = "https://token.jup.ag/strict";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Quoting and swap-building service.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Best route for the request. No viable route is [`AppError::NoRoute`].
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse>;

    /// Unsigned swap transaction for a previously returned quote.
    async fn build_swap(&self, quote: &QuoteResponse, user: &Pubkey) -> Result<SwapTransactionResponse>;
}

// region: --- Main Client

/// Builder for configuring JupiterClient.
#[derive(Debug, Clone)]
pub struct JupiterClientBuilder {
    timeout: Duration,
    api_base: String,
    token_list_url: String,
    api_key: Option<String>,
}

impl Default for JupiterClientBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            api_base: DEFAULT_API_BASE.to_string(),
            token_list_url: DEFAULT_TOKEN_LIST_URL.to_string(),
            api_key: None,
        }
    }
}

impl JupiterClientBuilder {
    /// Set the HTTP request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the swap API base URL (quote and swap endpoints).
    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the token list URL.
    pub fn token_list_url(mut self, url: impl Into<String>) -> Self {
        self.token_list_url = url.into();
        self
    }

    /// Set the API key sent as `x-api-key`.
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Build the JupiterClient with configured settings.
    pub fn build(self) -> Result<JupiterClient> {
        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        let inner = JupiterHttpClient {
            http,
            api_base: self.api_base,
            token_list_url: self.token_list_url,
            api_key: self.api_key,
            token_cache: Arc::new(tokio::sync::RwLock::new(None)),
        };

        Ok(JupiterClient { inner })
    }
}

/// Client for Jupiter Aggregator API
pub struct JupiterClient {
    inner: JupiterHttpClient,
}

impl JupiterClient {
    /// Create a new Jupiter client using a builder for configuration.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use lib_solana::jupiter::JupiterClient;
    ///
    /// let client = JupiterClient::builder()
    ///     .timeout(std::time::Duration::from_secs(30))
    ///     .api_base("https://quote-api.jup.ag/v6")
    ///     .build()?;
    /// # Ok::<(), lib_core::AppError>(())
    /// ```
    pub fn builder() -> JupiterClientBuilder {
        JupiterClientBuilder::default()
    }

    /// Client configured from the engine [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::builder()
            .timeout(config.jupiter_timeout)
            .api_base(config.jupiter_api_base.clone())
            .token_list_url(config.token_list_url.clone())
            .api_key(config.jupiter_api_key.clone())
            .build()
    }

    // Delegate methods to inner client
    pub async fn load_token_list(&self) -> Result<()> {
        self.inner.load_token_list().await
    }

    /// Resolve a symbol or mint address against the cached token list.
    pub async fn find_asset(&self, query: &str) -> Result<Option<Asset>> {
        self.inner.find_asset(query).await
    }

    /// Fetch the token list (direct API call, not cached)
    pub async fn get_token_list(&self) -> Result<Vec<TokenInfo>> {
        self.inner.get_token_list().await
    }

    pub async fn get_swap_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        self.inner.get_swap_quote(request).await
    }

    pub async fn get_swap_transaction(
        &self,
        quote_response: &QuoteResponse,
        user_public_key: &Pubkey,
    ) -> Result<SwapTransactionResponse> {
        self.inner.get_swap_transaction(quote_response, user_public_key).await
    }
}

#[async_trait]
impl QuoteSource for JupiterClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse> {
        self.get_swap_quote(request).await
    }

    async fn build_swap(&self, quote: &QuoteResponse, user: &Pubkey) -> Result<SwapTransactionResponse> {
        self.get_swap_transaction(quote, user).await
    }
}

// endregion: --- Main Client
