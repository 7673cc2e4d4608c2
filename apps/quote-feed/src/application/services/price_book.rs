//! Latest-Price Aggregate
//!
//! Keeps the most recently received price per symbol. Updates are applied
//! in receipt order by the dispatcher task that owns message delivery;
//! other readers only ever see immutable snapshots.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::streaming::{PriceUpdate, Symbol};

/// Running "latest price by symbol" map.
///
/// `apply` is an unconditional overwrite: across a reconnect the stream may
/// replay duplicates or superseded values, and the contract is
/// latest-value-by-receipt, not an append-only log. Reads hand out owned
/// copies so no reader can observe a torn entry.
#[derive(Debug, Default)]
pub struct PriceBook {
    prices: RwLock<HashMap<Symbol, PriceUpdate>>,
}

impl PriceBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `update` as the latest price for its symbol.
    pub fn apply(&self, update: PriceUpdate) {
        self.prices.write().insert(update.symbol.clone(), update);
    }

    /// Record a batch of updates in order.
    pub fn apply_all<I>(&self, updates: I)
    where
        I: IntoIterator<Item = PriceUpdate>,
    {
        let mut prices = self.prices.write();
        for update in updates {
            prices.insert(update.symbol.clone(), update);
        }
    }

    /// Latest price for `symbol`, if any was received.
    #[must_use]
    pub fn latest(&self, symbol: &str) -> Option<PriceUpdate> {
        self.prices.read().get(symbol).cloned()
    }

    /// Owned copy of the whole book (copy-on-read).
    #[must_use]
    pub fn snapshot(&self) -> HashMap<Symbol, PriceUpdate> {
        self.prices.read().clone()
    }

    /// Number of symbols with a recorded price.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.read().len()
    }

    /// Whether no price has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.read().is_empty()
    }
}
