//! Broadcast Channel Adapters
//!
//! Fan-out of feed output to downstream consumers (persistence, UI) using
//! tokio broadcast channels.
//!
//! # Architecture
//!
//! The [`FeedHub`] provides one channel per output kind:
//! - coalesced price-update batches from the dispatcher
//! - connection-state transitions from the streaming client
//! - batch progress records from the catch-up fetcher
//!
//! Each channel supports multiple receivers with configurable capacity;
//! slow receivers lag rather than block the producers.

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::domain::streaming::{BatchProgress, ConnectionState, PriceUpdate};

// =============================================================================
// Configuration
// =============================================================================

/// Capacities for the hub's broadcast channels.
#[derive(Debug, Clone, Copy)]
pub struct FeedHubConfig {
    /// Capacity of the price-batch channel.
    pub price_batches_capacity: usize,
    /// Capacity of the connection-status channel.
    pub status_capacity: usize,
    /// Capacity of the batch-progress channel.
    pub progress_capacity: usize,
}

impl Default for FeedHubConfig {
    fn default() -> Self {
        Self {
            price_batches_capacity: 1_024,
            status_capacity: 64,
            progress_capacity: 256,
        }
    }
}

// =============================================================================
// Feed Hub
// =============================================================================

/// Central hub for all feed output channels.
///
/// # Example
///
/// ```rust
/// use quote_feed::infrastructure::broadcast::{FeedHub, FeedHubConfig};
///
/// let hub = FeedHub::new(FeedHubConfig::default());
///
/// // Get a receiver for price batches
/// let mut rx = hub.price_batches();
///
/// // In another task, publish batches
/// // hub.send_price_batch(batch);
/// ```
#[derive(Debug)]
pub struct FeedHub {
    price_batches_tx: broadcast::Sender<Vec<PriceUpdate>>,
    status_tx: broadcast::Sender<ConnectionState>,
    progress_tx: broadcast::Sender<BatchProgress>,
}

impl FeedHub {
    /// Create a new hub with the given channel capacities.
    #[must_use]
    pub fn new(config: FeedHubConfig) -> Self {
        let (price_batches_tx, _) = broadcast::channel(config.price_batches_capacity);
        let (status_tx, _) = broadcast::channel(config.status_capacity);
        let (progress_tx, _) = broadcast::channel(config.progress_capacity);

        Self {
            price_batches_tx,
            status_tx,
            progress_tx,
        }
    }

    /// Publish a coalesced batch of price updates.
    ///
    /// Returns the number of receivers the batch reached (zero when nobody
    /// is listening, which is not an error).
    pub fn send_price_batch(&self, batch: Vec<PriceUpdate>) -> usize {
        self.price_batches_tx.send(batch).unwrap_or(0)
    }

    /// Publish a connection-state transition.
    pub fn send_status(&self, state: ConnectionState) -> usize {
        self.status_tx.send(state).unwrap_or(0)
    }

    /// Publish a batch-progress record.
    pub fn send_progress(&self, progress: BatchProgress) -> usize {
        self.progress_tx.send(progress).unwrap_or(0)
    }

    /// New receiver for price-update batches.
    #[must_use]
    pub fn price_batches(&self) -> broadcast::Receiver<Vec<PriceUpdate>> {
        self.price_batches_tx.subscribe()
    }

    /// Price-update batches as a [`futures::Stream`].
    #[must_use]
    pub fn price_batch_stream(&self) -> BroadcastStream<Vec<PriceUpdate>> {
        BroadcastStream::new(self.price_batches_tx.subscribe())
    }

    /// New receiver for connection-state transitions.
    #[must_use]
    pub fn status(&self) -> broadcast::Receiver<ConnectionState> {
        self.status_tx.subscribe()
    }

    /// New receiver for batch-progress records.
    #[must_use]
    pub fn progress(&self) -> broadcast::Receiver<BatchProgress> {
        self.progress_tx.subscribe()
    }

    /// Number of active price-batch receivers.
    #[must_use]
    pub fn price_batch_receiver_count(&self) -> usize {
        self.price_batches_tx.receiver_count()
    }

    /// Snapshot of receiver counts across all channels.
    #[must_use]
    pub fn stats(&self) -> FeedHubStats {
        FeedHubStats {
            price_batch_receivers: self.price_batches_tx.receiver_count(),
            status_receivers: self.status_tx.receiver_count(),
            progress_receivers: self.progress_tx.receiver_count(),
        }
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new(FeedHubConfig::default())
    }
}

/// Receiver counts per hub channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedHubStats {
    /// Active price-batch receivers.
    pub price_batch_receivers: usize,
    /// Active status receivers.
    pub status_receivers: usize,
    /// Active progress receivers.
    pub progress_receivers: usize,
}

impl FeedHubStats {
    /// Total receivers across all channels.
    #[must_use]
    pub const fn total_receivers(&self) -> usize {
        self.price_batch_receivers + self.status_receivers + self.progress_receivers
    }
}

// =============================================================================
// Tests
// =============================================================================
