//! Feed Configuration Settings
//!
//! Configuration types for the feed core, loaded from environment
//! variables. Everything except the upstream credentials has a default.
//!
//! # Environment Variables
//!
//! ## Required
//! - `QUOTE_FEED_STREAM_TOKEN`: streaming API token
//! - `QUOTE_FEED_API_KEY`: quote REST API key
//!
//! ## Optional
//! - `QUOTE_FEED_STREAM_URL`: streaming endpoint (default: `wss://ws.finnhub.io`)
//! - `QUOTE_FEED_QUOTE_API_URL`: REST endpoint (default: `https://api.twelvedata.com`)
//! - `QUOTE_FEED_HEARTBEAT_INTERVAL_SECS` / `QUOTE_FEED_HEARTBEAT_TIMEOUT_SECS`
//! - `QUOTE_FEED_RECONNECT_DELAY_INITIAL_MS` / `QUOTE_FEED_RECONNECT_DELAY_MAX_SECS`
//! - `QUOTE_FEED_RECONNECT_DELAY_MULTIPLIER` / `QUOTE_FEED_MAX_RECONNECT_ATTEMPTS`
//! - `QUOTE_FEED_SUBSCRIBE_SETTLE_MS` / `QUOTE_FEED_FLUSH_RETRY_DELAY_MS`
//! - `QUOTE_FEED_MAX_FLUSH_ATTEMPTS`
//! - `QUOTE_FEED_BATCH_SIZE` / `QUOTE_FEED_INTER_REQUEST_DELAY_SECS`
//! - `QUOTE_FEED_MAX_BATCH_RETRIES`
//! - `QUOTE_FEED_COALESCE_WINDOW_MS`
//! - `QUOTE_FEED_PRICE_BATCH_CAPACITY` / `QUOTE_FEED_STATUS_CAPACITY`
//! - `QUOTE_FEED_PROGRESS_CAPACITY`

use std::time::Duration;

use crate::application::services::PriceDispatcherConfig;
use crate::infrastructure::broadcast::FeedHubConfig;
use crate::infrastructure::finnhub::{
    BackoffConfig, FeedConnectionConfig, HeartbeatConfig,
};
use crate::infrastructure::twelvedata::{FetchSettings, TwelveDataConfig};

// =============================================================================
// Credentials
// =============================================================================

/// Upstream API credentials.
#[derive(Clone)]
pub struct Credentials {
    stream_token: String,
    api_key: String,
}

impl Credentials {
    /// Create new credentials.
    #[must_use]
    pub const fn new(stream_token: String, api_key: String) -> Self {
        Self {
            stream_token,
            api_key,
        }
    }

    /// Streaming API token.
    #[must_use]
    pub fn stream_token(&self) -> &str {
        &self.stream_token
    }

    /// Quote REST API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("stream_token", &"[REDACTED]")
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Stream Settings
// =============================================================================

/// Streaming connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Streaming endpoint without the token query parameter.
    pub url: String,
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Heartbeat acknowledgment timeout.
    pub heartbeat_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Settle period after open before subscribe frames go out.
    pub subscribe_settle: Duration,
    /// Fixed delay between subscription flush retries.
    pub flush_retry_delay: Duration,
    /// Flush retries before giving up until the next trigger.
    pub max_flush_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: "wss://ws.finnhub.io".to_string(),
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 10,
            subscribe_settle: Duration::from_millis(500),
            flush_retry_delay: Duration::from_millis(250),
            max_flush_attempts: 5,
        }
    }
}

// =============================================================================
// Feed Configuration
// =============================================================================

/// Complete feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Upstream credentials.
    pub credentials: Credentials,
    /// Streaming connection settings.
    pub stream: StreamSettings,
    /// Catch-up fetch settings.
    pub fetch: FetchSettings,
    /// Quote REST endpoint.
    pub quote_api_url: String,
    /// Coalescing window for price-batch output.
    pub coalesce_window: Duration,
    /// Broadcast channel capacities.
    pub hub: FeedHubConfig,
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required environment variable is missing or
    /// empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let stream_token = require_env("QUOTE_FEED_STREAM_TOKEN")?;
        let api_key = require_env("QUOTE_FEED_API_KEY")?;

        let stream_defaults = StreamSettings::default();
        let stream = StreamSettings {
            url: std::env::var("QUOTE_FEED_STREAM_URL").unwrap_or(stream_defaults.url),
            heartbeat_interval: parse_env_duration_secs(
                "QUOTE_FEED_HEARTBEAT_INTERVAL_SECS",
                stream_defaults.heartbeat_interval,
            ),
            heartbeat_timeout: parse_env_duration_secs(
                "QUOTE_FEED_HEARTBEAT_TIMEOUT_SECS",
                stream_defaults.heartbeat_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "QUOTE_FEED_RECONNECT_DELAY_INITIAL_MS",
                stream_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "QUOTE_FEED_RECONNECT_DELAY_MAX_SECS",
                stream_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "QUOTE_FEED_RECONNECT_DELAY_MULTIPLIER",
                stream_defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "QUOTE_FEED_MAX_RECONNECT_ATTEMPTS",
                stream_defaults.max_reconnect_attempts,
            ),
            subscribe_settle: parse_env_duration_millis(
                "QUOTE_FEED_SUBSCRIBE_SETTLE_MS",
                stream_defaults.subscribe_settle,
            ),
            flush_retry_delay: parse_env_duration_millis(
                "QUOTE_FEED_FLUSH_RETRY_DELAY_MS",
                stream_defaults.flush_retry_delay,
            ),
            max_flush_attempts: parse_env_u32(
                "QUOTE_FEED_MAX_FLUSH_ATTEMPTS",
                stream_defaults.max_flush_attempts,
            ),
        };

        let fetch_defaults = FetchSettings::default();
        let fetch = FetchSettings {
            batch_size: parse_env_usize("QUOTE_FEED_BATCH_SIZE", fetch_defaults.batch_size),
            inter_request_delay: parse_env_duration_secs(
                "QUOTE_FEED_INTER_REQUEST_DELAY_SECS",
                fetch_defaults.inter_request_delay,
            ),
            max_batch_retries: parse_env_u32(
                "QUOTE_FEED_MAX_BATCH_RETRIES",
                fetch_defaults.max_batch_retries,
            ),
        };

        let hub_defaults = FeedHubConfig::default();
        let hub = FeedHubConfig {
            price_batches_capacity: parse_env_usize(
                "QUOTE_FEED_PRICE_BATCH_CAPACITY",
                hub_defaults.price_batches_capacity,
            ),
            status_capacity: parse_env_usize(
                "QUOTE_FEED_STATUS_CAPACITY",
                hub_defaults.status_capacity,
            ),
            progress_capacity: parse_env_usize(
                "QUOTE_FEED_PROGRESS_CAPACITY",
                hub_defaults.progress_capacity,
            ),
        };

        Ok(Self {
            credentials: Credentials::new(stream_token, api_key),
            stream,
            fetch,
            quote_api_url: std::env::var("QUOTE_FEED_QUOTE_API_URL")
                .unwrap_or_else(|_| "https://api.twelvedata.com".to_string()),
            coalesce_window: parse_env_duration_millis(
                "QUOTE_FEED_COALESCE_WINDOW_MS",
                PriceDispatcherConfig::default().coalesce_window,
            ),
            hub,
        })
    }

    /// Full streaming URL including the token query parameter.
    #[must_use]
    pub fn stream_url(&self) -> String {
        format!("{}?token={}", self.stream.url, self.credentials.stream_token)
    }

    /// Build the connection actor configuration.
    #[must_use]
    pub fn stream_connection_config(&self) -> FeedConnectionConfig {
        let mut config = FeedConnectionConfig::new(self.stream_url());
        config.backoff = BackoffConfig {
            initial_delay: self.stream.reconnect_delay_initial,
            max_delay: self.stream.reconnect_delay_max,
            multiplier: self.stream.reconnect_delay_multiplier,
            jitter_factor: 0.1,
            max_attempts: self.stream.max_reconnect_attempts,
        };
        config.heartbeat = HeartbeatConfig {
            ping_interval: self.stream.heartbeat_interval,
            ack_timeout: self.stream.heartbeat_timeout,
        };
        config.subscribe_settle = self.stream.subscribe_settle;
        config.flush_retry_delay = self.stream.flush_retry_delay;
        config.max_flush_attempts = self.stream.max_flush_attempts;
        config
    }

    /// Build the quote REST client configuration.
    #[must_use]
    pub fn quote_client_config(&self) -> TwelveDataConfig {
        TwelveDataConfig::new(self.credentials.api_key.clone())
            .with_base_url(self.quote_api_url.clone())
    }

    /// Build the dispatcher configuration.
    #[must_use]
    pub const fn dispatcher_config(&self) -> PriceDispatcherConfig {
        PriceDispatcherConfig {
            coalesce_window: self.coalesce_window,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

// =============================================================================
// Parse helpers
// =============================================================================

fn require_env(key: &str) -> Result<String, ConfigError> {
    let value =
        std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

// =============================================================================
// Tests
// =============================================================================
