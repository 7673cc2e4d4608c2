//! Quote REST Client
//!
//! reqwest-backed implementation of the `QuoteSource` port against the
//! TwelveData `/quote` endpoint. Per-symbol upstream errors are logged and
//! skipped; a response with zero usable quotes surfaces as the typed
//! validation error so callers can distinguish "partial" from "nothing".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::application::ports::{QuoteSource, QuoteSourceError};
use crate::domain::streaming::{Quote, Symbol};
use crate::infrastructure::twelvedata::types::{ApiErrorPayload, QuotePayload, SymbolEntry};

/// Configuration for the quote REST client.
#[derive(Debug, Clone)]
pub struct TwelveDataConfig {
    /// API base URL.
    pub base_url: String,
    /// API key sent as the `apikey` query parameter.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl TwelveDataConfig {
    /// Production configuration for `api_key`.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.twelvedata.com".to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the base URL (useful for tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// HTTP quote client.
#[derive(Debug, Clone)]
pub struct TwelveDataClient {
    client: Client,
    config: TwelveDataConfig,
}

impl TwelveDataClient {
    /// Build a client from config.
    pub fn new(config: TwelveDataConfig) -> Result<Self, QuoteSourceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QuoteSourceError::Http(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Decode a `/quote` response body for the requested symbols.
    fn parse_response(
        symbols: &[Symbol],
        body: serde_json::Value,
    ) -> Result<Vec<Quote>, QuoteSourceError> {
        // A whole-request failure arrives as a bare error object.
        if body.get("status").and_then(|s| s.as_str()) == Some("error") {
            let error: ApiErrorPayload = serde_json::from_value(body)
                .map_err(|e| QuoteSourceError::InvalidResponse(e.to_string()))?;
            return Err(QuoteSourceError::Api {
                code: error.code,
                message: error.message,
            });
        }

        // Single-symbol requests return the bare quote payload.
        if symbols.len() == 1 && body.get("symbol").is_some() {
            let payload: QuotePayload = serde_json::from_value(body)
                .map_err(|e| QuoteSourceError::InvalidResponse(e.to_string()))?;
            return Ok(vec![payload.into_quote()]);
        }

        let map = body
            .as_object()
            .ok_or_else(|| {
                QuoteSourceError::InvalidResponse("expected a symbol-keyed object".to_string())
            })?
            .clone();

        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let Some(entry) = map.get(symbol) else {
                tracing::warn!(%symbol, "no entry in quote response");
                continue;
            };

            match serde_json::from_value::<SymbolEntry>(entry.clone()) {
                Ok(SymbolEntry::Quote(payload)) => quotes.push(payload.into_quote()),
                Ok(SymbolEntry::Error(error)) => {
                    tracing::warn!(
                        %symbol,
                        code = error.code,
                        message = %error.message,
                        "per-symbol quote error"
                    );
                }
                Err(e) => {
                    tracing::warn!(%symbol, error = %e, "undecodable quote entry");
                }
            }
        }

        if quotes.is_empty() {
            return Err(QuoteSourceError::EmptyResponse {
                symbols: symbols.to_vec(),
            });
        }

        Ok(quotes)
    }
}

#[async_trait]
impl QuoteSource for TwelveDataClient {
    async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, QuoteSourceError> {
        if symbols.is_empty() {
            return Err(QuoteSourceError::EmptyRequest);
        }

        let url = format!("{}/quote", self.config.base_url);
        let joined = symbols.join(",");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", joined.as_str()),
                ("apikey", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| QuoteSourceError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QuoteSourceError::Http(format!(
                "status {status}: {body}"
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| QuoteSourceError::InvalidResponse(e.to_string()))?;

        Self::parse_response(symbols, body)
    }
}

// =============================================================================
// Tests
// =============================================================================
