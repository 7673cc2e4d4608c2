#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::default_trait_access,
        clippy::items_after_statements
    )
)]

//! Quote Feed - Watchlist Price Feed Core
//!
//! Maintains a live "latest price by symbol" view for a watchlist universe
//! by combining two data paths:
//!
//! - A **streaming path**: a WebSocket connection with automatic
//!   reconnection, heartbeat keep-alive, and pending/confirmed subscription
//!   management (`infrastructure::finnhub`).
//! - A **catch-up path**: a strictly sequential batched REST fetcher that
//!   sweeps a large symbol universe under upstream rate limits
//!   (`infrastructure::twelvedata`).
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Price and subscription types with no I/O
//!   - `streaming`: symbols, price updates, quotes, connection state
//!   - `subscription`: pending/confirmed subscription tracking
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: interfaces for the price stream and the quote source
//!   - `services`: latest-price book and the coalescing dispatcher
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `finnhub`: WebSocket streaming client
//!   - `twelvedata`: batch quote REST client and fetcher
//!   - `broadcast`: channel-based fan-out to downstream consumers
//!   - `config`: environment-driven configuration
//!
//! # Data Flow
//!
//! ```text
//! Finnhub WS ──► FeedConnection ──► FeedEvent ──┐
//!                                               ├──► PriceDispatcher ──► FeedHub ──► consumers
//! TwelveData ──► BatchedQuoteFetcher ───────────┘        │
//!                                                    PriceBook
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core price and subscription types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{
    BatchProgress, ConnectionState, PriceUpdate, Quote, Symbol, normalize_symbol,
};
pub use domain::subscription::SubscriptionSet;

// Ports
pub use application::ports::{PriceStream, QuoteSource, QuoteSourceError};

// Application services
pub use application::services::{PriceBook, PriceDispatcher, PriceDispatcherConfig};

// Streaming client
pub use infrastructure::finnhub::{
    BackoffConfig, BackoffPolicy, CodecError, FeedConnection, FeedConnectionConfig, FeedEvent,
    FeedHandle, FeedMessage, HeartbeatConfig, JsonCodec,
};

// Batch quote fetcher
pub use infrastructure::twelvedata::{
    BatchedQuoteFetcher, FetchSettings, FetchSummary, TwelveDataClient, TwelveDataConfig,
};

// Broadcast hub
pub use infrastructure::broadcast::{FeedHub, FeedHubConfig, FeedHubStats};

// Deterministic fake for tests and demos
pub use infrastructure::mock::MockPriceStream;

// Configuration
pub use infrastructure::config::{ConfigError, Credentials, FeedConfig, StreamSettings};
