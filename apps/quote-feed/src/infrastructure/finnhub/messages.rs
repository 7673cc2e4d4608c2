//! Finnhub WebSocket Message Types
//!
//! Wire format types for the streaming connection. Inbound messages are
//! JSON objects discriminated by a top-level `type` field; outbound control
//! frames use the same convention.
//!
//! # Message Types
//!
//! ## Inbound
//! - `trade`: batch of trade ticks (`data` array)
//! - `ping` / `pong`: keep-alive acknowledgment
//! - `subscribe-status`: per-symbol subscription confirmation/rejection
//! - `error`: upstream error message
//!
//! ## Outbound
//! - `subscribe` / `unsubscribe`: one symbol per frame
//! - `ping`: keep-alive probe

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::streaming::{PriceUpdate, Symbol};

// =============================================================================
// Outbound Control Frames
// =============================================================================

/// Outbound control frame.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscribe","symbol":"AAPL"}
/// {"type":"unsubscribe","symbol":"AAPL"}
/// {"type":"ping"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlFrame {
    /// Subscribe to trade ticks for one symbol.
    Subscribe {
        /// Ticker symbol.
        symbol: Symbol,
    },
    /// Unsubscribe from one symbol.
    Unsubscribe {
        /// Ticker symbol.
        symbol: Symbol,
    },
    /// Keep-alive probe.
    Ping,
}

// =============================================================================
// Inbound Messages
// =============================================================================

/// A single trade tick inside a `trade` message's `data` array.
///
/// # Wire Format (JSON)
/// ```json
/// {"s":"AAPL","p":189.30,"t":1690000000000,"v":100}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Ticker symbol.
    #[serde(rename = "s")]
    pub symbol: Symbol,

    /// Trade price.
    #[serde(rename = "p")]
    pub price: Decimal,

    /// Trade time as Unix milliseconds.
    #[serde(rename = "t")]
    pub timestamp_ms: i64,

    /// Trade volume, when reported.
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,
}

impl TradeTick {
    /// Convert the tick into a domain [`PriceUpdate`].
    ///
    /// Ticks with an out-of-range timestamp fall back to the receive time.
    #[must_use]
    pub fn into_price_update(self) -> PriceUpdate {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms)
            .map_or_else(Utc::now, |t| t);
        PriceUpdate::new(self.symbol, self.price, timestamp)
    }
}

/// Payload of a `trade` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMessage {
    /// Trade ticks in receipt order.
    #[serde(default)]
    pub data: Vec<TradeTick>,
}

/// A subscription the upstream rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedSubscription {
    /// Rejected symbol.
    pub symbol: Symbol,
    /// Upstream-supplied reason.
    pub reason: String,
}

/// Payload of a `subscribe-status` message.
///
/// # Wire Format (JSON)
/// ```json
/// {
///   "type": "subscribe-status",
///   "confirmed": ["AAPL", "MSFT"],
///   "failed": [{"symbol": "XXXX", "reason": "unknown symbol"}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeStatusMessage {
    /// Symbols acknowledged as subscribed.
    #[serde(default)]
    pub confirmed: Vec<Symbol>,

    /// Symbols the upstream refused, with reasons.
    #[serde(default)]
    pub failed: Vec<RejectedSubscription>,
}

/// Payload of an `error` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Upstream error message.
    pub msg: String,
}

// =============================================================================
// Tests
// =============================================================================
