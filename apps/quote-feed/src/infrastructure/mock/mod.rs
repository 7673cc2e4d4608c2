//! Mock price stream for testing.
//!
//! A deterministic, in-memory implementation of the `PriceStream` port:
//! connects instantly, flushes pending subscriptions synchronously, and
//! lets tests script price ticks onto the event stream. Useful for
//! exercising consumers (dispatchers, UIs) without a transport.

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::application::ports::{FeedEvent, PriceStream};
use crate::domain::streaming::{ConnectionState, PriceUpdate, Symbol};
use crate::domain::subscription::SubscriptionSet;

/// Deterministic in-memory price stream.
#[derive(Debug)]
pub struct MockPriceStream {
    event_tx: broadcast::Sender<FeedEvent>,
    subscriptions: RwLock<SubscriptionSet>,
    state: RwLock<ConnectionState>,
}

impl Default for MockPriceStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPriceStream {
    /// Create a new mock stream.
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1_024);
        Self {
            event_tx,
            subscriptions: RwLock::new(SubscriptionSet::new()),
            state: RwLock::new(ConnectionState::Disconnected),
        }
    }

    /// Script a price tick onto the event stream.
    pub fn emit_price(&self, update: PriceUpdate) {
        let _ = self.event_tx.send(FeedEvent::Price(update));
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// All tracked symbols (pending and confirmed).
    #[must_use]
    pub fn tracked_symbols(&self) -> Vec<Symbol> {
        let subscriptions = self.subscriptions.read();
        let mut symbols = subscriptions.pending();
        symbols.extend(subscriptions.confirmed());
        symbols
    }

    /// Confirmed symbols only.
    #[must_use]
    pub fn confirmed_symbols(&self) -> Vec<Symbol> {
        self.subscriptions.read().confirmed()
    }

    fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write();
        if *current != state {
            *current = state;
            let _ = self.event_tx.send(FeedEvent::StateChanged(state));
        }
    }

    fn flush_pending(&self) {
        let flushed = self.subscriptions.write().take_pending();
        if !flushed.is_empty() {
            let _ = self.event_tx.send(FeedEvent::Subscribed { symbols: flushed });
        }
    }
}

impl PriceStream for MockPriceStream {
    fn connect(&self) {
        if matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Connecting
        ) {
            return;
        }
        self.set_state(ConnectionState::Connecting);
        self.set_state(ConnectionState::Connected);
        self.flush_pending();
    }

    fn disconnect(&self, clear_pending: bool) {
        {
            let mut subscriptions = self.subscriptions.write();
            if clear_pending {
                subscriptions.clear_all();
            } else {
                subscriptions.clear_confirmed();
            }
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn subscribe(&self, symbols: Vec<Symbol>) {
        let _ = self.subscriptions.write().request(symbols);
        match self.state() {
            ConnectionState::Connected => self.flush_pending(),
            ConnectionState::Disconnected => self.connect(),
            ConnectionState::Connecting | ConnectionState::Reconnecting => {}
        }
    }

    fn unsubscribe(&self, symbols: Vec<Symbol>) {
        let _ = self.subscriptions.write().remove(&symbols);
    }

    fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.event_tx.subscribe()
    }
}

// =============================================================================
// Tests
// =============================================================================
