//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following the
//! Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`PriceStream`]: the live streaming connection (real WebSocket adapter
//!   in `infrastructure::finnhub`, mock implementations in tests)
//! - [`QuoteSource`]: the request/response quote transport used by the
//!   batch catch-up fetcher (`infrastructure::twelvedata`, or a wiremock /
//!   mockall double in tests)

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::streaming::{ConnectionState, PriceUpdate, Quote, Symbol};

// =============================================================================
// Price Stream Port
// =============================================================================

/// Events emitted by a [`PriceStream`] implementation.
///
/// This is the observe() side of the port: consumers watch connection-state
/// transitions and per-symbol price ticks on a broadcast channel. Transport
/// failures never appear here as terminal errors: the stream recovers via
/// reconnect and consumers only ever see the state signal.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// The connection moved to a new lifecycle state.
    StateChanged(ConnectionState),
    /// A price tick arrived on the wire.
    Price(PriceUpdate),
    /// Subscribe directives were sent for these symbols.
    Subscribed {
        /// Symbols flushed to the wire.
        symbols: Vec<Symbol>,
    },
    /// The upstream rejected a subscription.
    SubscriptionRejected {
        /// Rejected symbol.
        symbol: Symbol,
        /// Upstream-supplied reason.
        reason: String,
    },
    /// Automatic reconnection gave up after reaching the attempt ceiling.
    ///
    /// Terminal for this connection instance: no further automatic retries
    /// run until the host application calls `connect()` again.
    ReconnectsExhausted {
        /// Attempts consumed before giving up.
        attempts: u32,
    },
    /// A non-fatal upstream error message.
    Error(String),
}

/// A live price streaming connection.
///
/// Commands are fire-and-forget: they enqueue onto the connection actor and
/// their effects are observable through [`PriceStream::events`]. All
/// implementations serialize state transitions internally, so callers may
/// invoke commands from any task.
pub trait PriceStream: Send + Sync {
    /// Open the connection. No-op while already connected or connecting;
    /// during a backoff wait this cancels the scheduled retry and attempts
    /// immediately (the manual-retry affordance).
    fn connect(&self);

    /// Tear the connection down.
    ///
    /// Confirmed subscriptions and any queued outbound frames are always
    /// cleared; pending subscriptions are cleared only when `clear_pending`
    /// is true (a user-initiated stop). A soft network failure never goes
    /// through here; a soft failure keeps pending so the feed re-establishes itself.
    fn disconnect(&self, clear_pending: bool);

    /// Request subscriptions for `symbols`, connecting first if idle.
    /// Already-tracked symbols are skipped.
    fn subscribe(&self, symbols: Vec<Symbol>);

    /// Drop subscriptions for `symbols`.
    fn unsubscribe(&self, symbols: Vec<Symbol>);

    /// Observe the stream: a new receiver for the event broadcast.
    fn events(&self) -> broadcast::Receiver<FeedEvent>;
}

// =============================================================================
// Quote Source Port
// =============================================================================

/// Errors from a [`QuoteSource`].
///
/// The validation variants (`EmptyRequest`, `EmptyResponse`,
/// `InvalidResponse`) are the one error class that propagates to callers
/// rather than being absorbed: they indicate a caller-correctable problem
/// or a batch with zero usable results.
#[derive(Debug, thiserror::Error)]
pub enum QuoteSourceError {
    /// The caller passed an empty symbol list.
    #[error("empty symbol list")]
    EmptyRequest,

    /// The upstream answered but produced no usable quotes.
    #[error("invalid or empty response for symbols: {symbols:?}")]
    EmptyResponse {
        /// Symbols that were requested.
        symbols: Vec<Symbol>,
    },

    /// The response body did not match the expected shape.
    #[error("invalid response shape: {0}")]
    InvalidResponse(String),

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(String),

    /// Upstream API error payload.
    #[error("api error {code}: {message}")]
    Api {
        /// Upstream error code.
        code: i64,
        /// Upstream error message.
        message: String,
    },
}

/// A request/response quote transport, called once per batch.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch quotes for a batch of symbols.
    ///
    /// Implementations skip per-symbol upstream errors and return whatever
    /// quotes were usable; zero usable quotes is [`QuoteSourceError::EmptyResponse`].
    async fn fetch_quotes(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, QuoteSourceError>;
}
