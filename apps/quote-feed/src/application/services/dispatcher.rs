//! Price Dispatch Service
//!
//! The single consumer that owns price delivery. It drains two input lanes
//! (the streaming connection's event broadcast and the catch-up fetcher's
//! bulk update channel), applies everything to the [`PriceBook`], and
//! publishes coalesced per-window batches plus connection-state transitions
//! to the [`FeedHub`].
//!
//! Coalescing keeps only the latest update per symbol inside each window,
//! so a burst of ticks for one symbol reaches consumers as a single entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use crate::application::ports::FeedEvent;
use crate::application::services::PriceBook;
use crate::domain::streaming::{PriceUpdate, Symbol};
use crate::infrastructure::broadcast::FeedHub;

/// Configuration for the dispatch loop.
#[derive(Debug, Clone, Copy)]
pub struct PriceDispatcherConfig {
    /// Width of the coalescing window.
    pub coalesce_window: Duration,
}

impl Default for PriceDispatcherConfig {
    fn default() -> Self {
        Self {
            coalesce_window: Duration::from_millis(250),
        }
    }
}

/// Merges the streaming and catch-up lanes into hub output.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use quote_feed::{FeedHub, FeedHubConfig, PriceBook, PriceDispatcher, PriceDispatcherConfig};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # fn example(events: tokio::sync::broadcast::Receiver<quote_feed::FeedEvent>) {
/// let book = Arc::new(PriceBook::new());
/// let hub = Arc::new(FeedHub::new(FeedHubConfig::default()));
/// let (bulk_tx, bulk_rx) = mpsc::channel(64);
/// let cancel = CancellationToken::new();
///
/// let dispatcher = PriceDispatcher::new(
///     PriceDispatcherConfig::default(),
///     Arc::clone(&book),
///     Arc::clone(&hub),
///     events,
///     bulk_rx,
///     cancel.clone(),
/// );
/// tokio::spawn(dispatcher.run());
/// // hand `bulk_tx` to the catch-up fetcher
/// # let _ = bulk_tx;
/// # }
/// ```
pub struct PriceDispatcher {
    config: PriceDispatcherConfig,
    book: Arc<PriceBook>,
    hub: Arc<FeedHub>,
    events: broadcast::Receiver<FeedEvent>,
    bulk_rx: mpsc::Receiver<Vec<PriceUpdate>>,
    cancel: CancellationToken,
}

impl PriceDispatcher {
    /// Create a new dispatcher.
    #[must_use]
    pub const fn new(
        config: PriceDispatcherConfig,
        book: Arc<PriceBook>,
        hub: Arc<FeedHub>,
        events: broadcast::Receiver<FeedEvent>,
        bulk_rx: mpsc::Receiver<Vec<PriceUpdate>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            book,
            hub,
            events,
            bulk_rx,
            cancel,
        }
    }

    /// Run the dispatch loop until cancelled or both input lanes close.
    pub async fn run(mut self) {
        let mut window = tokio::time::interval(self.config.coalesce_window);
        window.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut buffer: HashMap<Symbol, PriceUpdate> = HashMap::new();
        let mut events_open = true;
        let mut bulk_open = true;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("price dispatcher cancelled");
                    return;
                }
                event = self.events.recv(), if events_open => {
                    match event {
                        Ok(FeedEvent::Price(update)) => {
                            self.book.apply(update.clone());
                            buffer.insert(update.symbol.clone(), update);
                        }
                        Ok(FeedEvent::StateChanged(state)) => {
                            self.hub.send_status(state);
                        }
                        Ok(FeedEvent::ReconnectsExhausted { attempts }) => {
                            tracing::error!(attempts, "stream reconnects exhausted");
                        }
                        Ok(FeedEvent::SubscriptionRejected { symbol, reason }) => {
                            tracing::warn!(%symbol, %reason, "subscription rejected");
                        }
                        Ok(FeedEvent::Error(message)) => {
                            tracing::warn!(%message, "stream error");
                        }
                        Ok(FeedEvent::Subscribed { .. }) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "price dispatcher lagged on event stream");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events_open = false;
                        }
                    }
                }
                batch = self.bulk_rx.recv(), if bulk_open => {
                    match batch {
                        Some(updates) => {
                            for update in updates {
                                self.book.apply(update.clone());
                                buffer.insert(update.symbol.clone(), update);
                            }
                        }
                        None => bulk_open = false,
                    }
                }
                _ = window.tick() => {
                    Self::flush(&self.hub, &mut buffer);
                }
            }

            if !events_open && !bulk_open {
                Self::flush(&self.hub, &mut buffer);
                tracing::debug!("price dispatcher input lanes closed");
                return;
            }
        }
    }

    fn flush(hub: &FeedHub, buffer: &mut HashMap<Symbol, PriceUpdate>) {
        if buffer.is_empty() {
            return;
        }
        let batch: Vec<PriceUpdate> = buffer.drain().map(|(_, update)| update).collect();
        hub.send_price_batch(batch);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::time::{Duration, timeout};

    use super::*;
    use crate::application::ports::PriceStream;
    use crate::domain::streaming::ConnectionState;
    use crate::infrastructure::mock::MockPriceStream;

    fn update(symbol: &str, cents: i64) -> PriceUpdate {
        PriceUpdate::new(symbol.to_string(), Decimal::new(cents, 2), Utc::now())
    }

    struct Harness {
        stream: Arc<MockPriceStream>,
        bulk_tx: mpsc::Sender<Vec<PriceUpdate>>,
        book: Arc<PriceBook>,
        hub: Arc<FeedHub>,
        cancel: CancellationToken,
    }

    fn spawn_dispatcher(window: Duration) -> Harness {
        let stream = Arc::new(MockPriceStream::new());
        let (bulk_tx, bulk_rx) = mpsc::channel(16);
        let book = Arc::new(PriceBook::new());
        let hub = Arc::new(FeedHub::default());
        let cancel = CancellationToken::new();

        let dispatcher = PriceDispatcher::new(
            PriceDispatcherConfig {
                coalesce_window: window,
            },
            Arc::clone(&book),
            Arc::clone(&hub),
            stream.events(),
            bulk_rx,
            cancel.clone(),
        );
        tokio::spawn(dispatcher.run());

        Harness {
            stream,
            bulk_tx,
            book,
            hub,
            cancel,
        }
    }

    #[tokio::test]
    async fn coalesces_to_latest_per_symbol() {
        let harness = spawn_dispatcher(Duration::from_millis(50));
        let mut batches = harness.hub.price_batches();

        harness.stream.emit_price(update("AAPL", 18900));
        harness.stream.emit_price(update("AAPL", 19050));
        harness.stream.emit_price(update("MSFT", 41000));

        let batch = timeout(Duration::from_secs(1), batches.recv())
            .await
            .expect("timeout")
            .unwrap();

        assert_eq!(batch.len(), 2);
        let aapl = batch.iter().find(|u| u.symbol == "AAPL").unwrap();
        assert_eq!(aapl.price, Decimal::new(19050, 2));

        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn empty_windows_emit_nothing() {
        let harness = spawn_dispatcher(Duration::from_millis(10));
        let mut batches = harness.hub.price_batches();

        // A few windows pass with no input; then one update arrives.
        tokio::time::sleep(Duration::from_millis(50)).await;
        harness.stream.emit_price(update("TSLA", 24000));

        let batch = timeout(Duration::from_secs(1), batches.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].symbol, "TSLA");

        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn forwards_state_changes_immediately() {
        let harness = spawn_dispatcher(Duration::from_secs(10));
        let mut status = harness.hub.status();

        harness.stream.connect();

        // Connecting and Connected both forward through the hub.
        let state = timeout(Duration::from_secs(1), status.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(state, ConnectionState::Connecting);
        let state = timeout(Duration::from_secs(1), status.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(state, ConnectionState::Connected);

        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn bulk_lane_updates_book_and_batches() {
        let harness = spawn_dispatcher(Duration::from_millis(50));
        let mut batches = harness.hub.price_batches();

        harness
            .bulk_tx
            .send(vec![update("JPM", 15500), update("V", 27500)])
            .await
            .unwrap();

        let batch = timeout(Duration::from_secs(1), batches.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(harness.book.len(), 2);
        assert!(harness.book.latest("JPM").is_some());

        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn closing_both_lanes_flushes_and_exits() {
        let (events_tx, events_rx) = broadcast::channel(64);
        let (bulk_tx, bulk_rx) = mpsc::channel(16);
        let book = Arc::new(PriceBook::new());
        let hub = Arc::new(FeedHub::default());
        let mut batches = hub.price_batches();

        let dispatcher = PriceDispatcher::new(
            PriceDispatcherConfig {
                coalesce_window: Duration::from_secs(60),
            },
            Arc::clone(&book),
            Arc::clone(&hub),
            events_rx,
            bulk_rx,
            CancellationToken::new(),
        );
        let handle = tokio::spawn(dispatcher.run());

        events_tx.send(FeedEvent::Price(update("AAPL", 18900))).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Dropping both producers closes the lanes; the buffered update must
        // still reach the hub before the task exits.
        drop(events_tx);
        drop(bulk_tx);

        let batch = timeout(Duration::from_secs(1), batches.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(batch[0].symbol, "AAPL");

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("dispatcher should exit")
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let harness = spawn_dispatcher(Duration::from_millis(10));

        harness.cancel.cancel();
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Ticks after cancellation go nowhere; the dispatcher no longer
        // applies updates to the book.
        harness.stream.emit_price(update("AAPL", 18900));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(harness.book.is_empty());
    }
}
