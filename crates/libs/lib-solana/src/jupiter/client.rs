//! # Jupiter HTTP Client
//!
//! HTTP client wrapper, response classification and token caching for the
//! Jupiter API.

use super::types::{ErrorBody, TokenInfo};
use crate::types::Asset;
use lib_core::{AppError, Result};
use lib_utils::validation::validate_not_empty;
use reqwest::{Client, RequestBuilder, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Jupiter error codes meaning "no route for this pair and amount".
const NO_ROUTE_CODES: &[&str] = &["COULD_NOT_FIND_ANY_ROUTE", "NO_ROUTES_FOUND", "TOKEN_NOT_TRADABLE"];

/// Cached token list
pub struct TokenCache {
    /// Uppercase symbol to asset
    by_symbol: HashMap<String, Asset>,
    /// Mint address (base58) to asset
    by_mint: HashMap<String, Asset>,
}

impl TokenCache {
    fn from_tokens(tokens: &[TokenInfo]) -> Self {
        let mut by_symbol = HashMap::new();
        let mut by_mint = HashMap::new();

        for token in tokens {
            let asset = match token.to_asset() {
                Ok(asset) => asset,
                Err(e) => {
                    warn!("Skipping token {}: {}", token.symbol, e);
                    continue;
                }
            };
            // First entry wins for duplicated symbols.
            by_symbol.entry(token.symbol.to_uppercase()).or_insert_with(|| asset.clone());
            by_mint.insert(token.address.clone(), asset);
        }

        Self { by_symbol, by_mint }
    }

    fn find(&self, query: &str) -> Option<Asset> {
        self.by_mint
            .get(query)
            .or_else(|| self.by_symbol.get(&query.to_uppercase()))
            .cloned()
    }
}

/// HTTP client wrapper for Jupiter API
pub struct JupiterHttpClient {
    pub http: Client,
    pub api_base: String,
    pub token_list_url: String,
    pub api_key: Option<String>,
    /// Cached token list with symbol and mint lookup
    pub token_cache: Arc<RwLock<Option<TokenCache>>>,
}

impl JupiterHttpClient {
    /// Attach the API key header when one is configured.
    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key.as_str()),
            None => request,
        }
    }

    /// Send a request and return the body of a successful response.
    ///
    /// Transport failures are [`AppError::Connectivity`]; non-success
    /// statuses go through [`classify_error_response`].
    pub(crate) async fn send(&self, context: &str, request: RequestBuilder) -> Result<String> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| transport_error(context, e))?;

        if !status.is_success() {
            return Err(classify_error_response(status, &body));
        }
        Ok(body)
    }

    /// Load and cache token list from Jupiter API
    pub async fn load_token_list(&self) -> Result<()> {
        let tokens = self.get_token_list().await?;
        let cache = TokenCache::from_tokens(&tokens);
        info!("Token list cached ({} tokens)", cache.by_mint.len());

        *self.token_cache.write().await = Some(cache);
        Ok(())
    }

    /// Resolve a symbol (case-insensitive) or mint address to an asset,
    /// loading the token list on first use.
    pub async fn find_asset(&self, query: &str) -> Result<Option<Asset>> {
        validate_not_empty(query, "Token").map_err(AppError::InvalidInput)?;
        if self.token_cache.read().await.is_none() {
            self.load_token_list().await?;
        }
        let cache = self.token_cache.read().await;
        Ok(cache.as_ref().and_then(|c| c.find(query.trim())))
    }

    /// Fetch complete token list with metadata from Jupiter
    pub async fn get_token_list(&self) -> Result<Vec<TokenInfo>> {
        let body = self
            .send("Jupiter token list request failed", self.http.get(&self.token_list_url))
            .await?;
        serde_json::from_str(&body)
            .map_err(|e| AppError::Decoding(format!("Jupiter token list parse failed: {}", e)))
    }
}

/// Map a reqwest failure to the engine's taxonomy.
pub(crate) fn transport_error(context: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Connectivity(format!("{}: request timed out", context))
    } else {
        AppError::Connectivity(format!("{}: {}", context, err))
    }
}

/// Map a non-success Jupiter response to the engine's taxonomy.
pub(crate) fn classify_error_response(status: StatusCode, body: &str) -> AppError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .clone()
        .unwrap_or_else(|| body.trim().chars().take(200).collect());

    let coded_no_route = parsed
        .error_code
        .as_deref()
        .is_some_and(|code| NO_ROUTE_CODES.contains(&code));
    let lower = message.to_lowercase();
    let worded_no_route = lower.contains("could not find any route") || lower.contains("no routes found");

    if status.is_client_error() && (coded_no_route || worded_no_route) {
        return AppError::NoRoute(message);
    }

    AppError::QuoteService(format!("HTTP {}: {}", status.as_u16(), message))
}
