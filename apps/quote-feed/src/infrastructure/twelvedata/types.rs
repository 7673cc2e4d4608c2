//! TwelveData REST Response Types
//!
//! Wire format types for the `/quote` endpoint. A multi-symbol request
//! returns a JSON object keyed by symbol, where each entry is either a
//! quote payload or a per-symbol error object; a single-symbol request
//! returns the bare quote payload.
//!
//! # Wire Format (JSON)
//! ```json
//! {
//!   "AAPL": {
//!     "symbol": "AAPL",
//!     "name": "Apple Inc",
//!     "exchange": "NASDAQ",
//!     "currency": "USD",
//!     "close": "189.30",
//!     "previous_close": "188.50",
//!     "timestamp": 1690000000
//!   },
//!   "XXXX": {"code": 404, "message": "symbol not found", "status": "error"}
//! }
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::streaming::{Quote, Symbol};

/// One quote payload as returned by the upstream.
///
/// Numeric fields arrive as strings; `Decimal`'s serde support decodes
/// both string and number representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotePayload {
    /// Ticker symbol.
    pub symbol: Symbol,
    /// Instrument display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Listing exchange.
    pub exchange: String,
    /// Quote currency code.
    pub currency: String,
    /// Last traded price.
    pub close: Decimal,
    /// Previous session close.
    pub previous_close: Decimal,
    /// Quote time as Unix seconds.
    pub timestamp: i64,
}

impl QuotePayload {
    /// Convert into the domain [`Quote`].
    ///
    /// Out-of-range timestamps fall back to the receive time.
    #[must_use]
    pub fn into_quote(self) -> Quote {
        let timestamp =
            DateTime::<Utc>::from_timestamp(self.timestamp, 0).map_or_else(Utc::now, |t| t);
        Quote {
            symbol: self.symbol,
            name: self.name,
            price: self.close,
            previous_close: self.previous_close,
            currency: self.currency,
            exchange: self.exchange,
            timestamp,
        }
    }
}

/// Per-symbol (or whole-request) error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorPayload {
    /// Upstream error code.
    pub code: i64,
    /// Upstream error message.
    pub message: String,
    /// Payload status marker (always "error" for errors).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// One entry of a multi-symbol response map.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SymbolEntry {
    /// A usable quote.
    Quote(Box<QuotePayload>),
    /// A per-symbol error (unknown symbol, plan limits, ...).
    Error(ApiErrorPayload),
}
