//! Price Streaming Types
//!
//! Core domain types for the price feed: symbols, price updates, quotes,
//! and the connection lifecycle. These types are codec-agnostic and
//! represent the canonical internal representation of market data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Symbols
// =============================================================================

/// A ticker symbol identifying one tradable instrument.
///
/// Symbols are non-empty uppercase strings. Equality is case-sensitive;
/// callers normalize via [`normalize_symbol`] before handing symbols to the
/// feed.
pub type Symbol = String;

/// Normalize a raw ticker string into a [`Symbol`].
///
/// Trims surrounding whitespace and uppercases. Returns `None` for strings
/// that are empty after trimming.
#[must_use]
pub fn normalize_symbol(raw: &str) -> Option<Symbol> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

// =============================================================================
// Price Updates
// =============================================================================

/// A single observed price for a symbol.
///
/// Produced by the streaming decoder and by the batch quote fetcher.
/// Immutable value; downstream consumers treat a sequence of updates as a
/// latest-value overwrite keyed by symbol, not an append-only log, since
/// duplicates and superseded values can arrive after a reconnect replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Last observed price.
    pub price: Decimal,
    /// When the price was observed upstream.
    pub timestamp: DateTime<Utc>,
}

impl PriceUpdate {
    /// Create a new price update.
    #[must_use]
    pub const fn new(symbol: Symbol, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol,
            price,
            timestamp,
        }
    }
}

// =============================================================================
// Quotes
// =============================================================================

/// A point-in-time quote for a symbol as returned by the REST catch-up API.
///
/// Richer than [`PriceUpdate`]: carries the previous close and listing
/// metadata used to build watchlist rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Instrument display name, when the upstream provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Last traded price.
    pub price: Decimal,
    /// Previous session close.
    pub previous_close: Decimal,
    /// Quote currency code (e.g. "USD").
    pub currency: String,
    /// Listing exchange (e.g. "NASDAQ").
    pub exchange: String,
    /// When the quote was produced upstream.
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Collapse this quote into a [`PriceUpdate`].
    #[must_use]
    pub fn into_price_update(self) -> PriceUpdate {
        PriceUpdate {
            symbol: self.symbol,
            price: self.price,
            timestamp: self.timestamp,
        }
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the streaming connection.
///
/// Owned exclusively by the connection actor; transitions are the only
/// mutation path. Observers receive state changes as events and via the
/// broadcast hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport; idle until a connect is requested.
    #[default]
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Transport open and receive loop running.
    Connected,
    /// Waiting out a backoff delay before the next connect attempt.
    Reconnecting,
}

impl ConnectionState {
    /// Human-readable state name for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

// =============================================================================
// Batch Progress
// =============================================================================

/// Outcome of one batch attempt during a catch-up sweep.
///
/// Emitted once per attempt (so a batch that fails twice and then succeeds
/// produces three records). Consumed by progress observers to render
/// "batch X of Y, retry N" status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based batch number ("batch X of Y").
    pub batch: usize,
    /// Total number of batches in the sweep.
    pub total_batches: usize,
    /// Retries consumed so far for this batch (0 on the first attempt).
    pub retry_count: u32,
    /// Whether this attempt succeeded.
    pub success: bool,
}

// =============================================================================
// Tests
// =============================================================================
