//! Batched Quote Fetcher
//!
//! Sweeps a symbol universe through the quote source in fixed-size batches,
//! strictly sequentially, pacing requests with a flat delay to respect
//! upstream rate limits. Batch failures retry a bounded number of times on
//! the same flat delay and are then skipped; the sweep itself always
//! completes, returning whatever partial results were gathered.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::ports::QuoteSource;
use crate::domain::streaming::{BatchProgress, PriceUpdate, Quote, Symbol};

// =============================================================================
// Settings and Summary
// =============================================================================

/// Tuning for a catch-up sweep.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Symbols per request.
    pub batch_size: usize,
    /// Flat delay between requests: both the retry delay and the
    /// inter-batch pacing use this single knob.
    pub inter_request_delay: Duration,
    /// Retries per batch after the first attempt (2 = 3 total attempts).
    pub max_batch_retries: u32,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            batch_size: 8,
            inter_request_delay: Duration::from_secs(60),
            max_batch_retries: 2,
        }
    }
}

/// Outcome of one sweep.
///
/// A sweep never fails outright: exhausted batches are recorded and
/// skipped, and cancellation returns what was gathered so far.
#[derive(Debug, Default)]
pub struct FetchSummary {
    /// Number of batches in the sweep.
    pub total_batches: usize,
    /// 1-based numbers of batches that exhausted their attempts.
    pub failed_batches: Vec<usize>,
    /// All updates gathered, in batch order.
    pub updates: Vec<PriceUpdate>,
    /// Whether the sweep was cancelled before completing.
    pub cancelled: bool,
}

/// Partition `universe` into order-preserving chunks of `batch_size`
/// (the last chunk may be short). A zero batch size is treated as 1.
fn partition(universe: &[Symbol], batch_size: usize) -> Vec<Vec<Symbol>> {
    universe
        .chunks(batch_size.max(1))
        .map(<[Symbol]>::to_vec)
        .collect()
}

// =============================================================================
// Fetcher
// =============================================================================

/// Sequential batched quote fetcher.
///
/// # Example
///
/// ```rust,no_run
/// use quote_feed::{BatchedQuoteFetcher, FetchSettings, TwelveDataClient, TwelveDataConfig};
/// use tokio::sync::mpsc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(universe: Vec<String>) {
/// let source = TwelveDataClient::new(TwelveDataConfig::new("key")).unwrap();
/// let fetcher = BatchedQuoteFetcher::new(source, FetchSettings::default(), CancellationToken::new());
///
/// let (progress_tx, _progress_rx) = mpsc::channel(64);
/// let (updates_tx, _updates_rx) = mpsc::channel(64);
/// let summary = fetcher.fetch_universe(&universe, &progress_tx, &updates_tx).await;
/// println!("{} batches, {} failed", summary.total_batches, summary.failed_batches.len());
/// # }
/// ```
pub struct BatchedQuoteFetcher<S> {
    source: S,
    settings: FetchSettings,
    cancel: CancellationToken,
}

impl<S: QuoteSource> BatchedQuoteFetcher<S> {
    /// Create a fetcher over `source`.
    #[must_use]
    pub const fn new(source: S, settings: FetchSettings, cancel: CancellationToken) -> Self {
        Self {
            source,
            settings,
            cancel,
        }
    }

    /// Sweep `universe` in batches.
    ///
    /// Emits one [`BatchProgress`] per attempt outcome on `progress_tx` and
    /// each successful batch's updates on `updates_tx`. An empty universe
    /// completes immediately with no output and no progress events.
    pub async fn fetch_universe(
        &self,
        universe: &[Symbol],
        progress_tx: &mpsc::Sender<BatchProgress>,
        updates_tx: &mpsc::Sender<Vec<PriceUpdate>>,
    ) -> FetchSummary {
        let batches = partition(universe, self.settings.batch_size);
        let total = batches.len();
        let mut summary = FetchSummary {
            total_batches: total,
            ..FetchSummary::default()
        };

        for (index, batch) in batches.iter().enumerate() {
            let number = index + 1;
            let mut retry_count: u32 = 0;

            loop {
                let result = tokio::select! {
                    () = self.cancel.cancelled() => {
                        tracing::info!(batch = number, "catch-up sweep cancelled");
                        summary.cancelled = true;
                        return summary;
                    }
                    result = self.source.fetch_quotes(batch) => result,
                };

                match result {
                    Ok(quotes) => {
                        let _ = progress_tx
                            .send(BatchProgress {
                                batch: number,
                                total_batches: total,
                                retry_count,
                                success: true,
                            })
                            .await;

                        let updates: Vec<PriceUpdate> =
                            quotes.into_iter().map(Quote::into_price_update).collect();
                        if !updates.is_empty() {
                            let _ = updates_tx.send(updates.clone()).await;
                            summary.updates.extend(updates);
                        }
                        break;
                    }
                    Err(e) if retry_count < self.settings.max_batch_retries => {
                        retry_count += 1;
                        tracing::warn!(
                            batch = number,
                            retry = retry_count,
                            error = %e,
                            "batch fetch failed, retrying after delay"
                        );
                        let _ = progress_tx
                            .send(BatchProgress {
                                batch: number,
                                total_batches: total,
                                retry_count,
                                success: false,
                            })
                            .await;

                        if !self.pause().await {
                            summary.cancelled = true;
                            return summary;
                        }
                    }
                    Err(e) => {
                        // Attempts exhausted: skip the batch, keep sweeping.
                        tracing::error!(
                            batch = number,
                            attempts = retry_count + 1,
                            error = %e,
                            "batch abandoned after exhausting retries"
                        );
                        summary.failed_batches.push(number);
                        break;
                    }
                }
            }

            // Pace the next batch; nothing to wait for after the last one.
            if number < total && !self.pause().await {
                summary.cancelled = true;
                return summary;
            }
        }

        summary
    }

    /// Wait out the inter-request delay. Returns `false` on cancellation.
    async fn pause(&self) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(self.settings.inter_request_delay) => true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
