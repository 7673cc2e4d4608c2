//! TwelveData Batch Quote REST Adapter
//!
//! Implements the catch-up path: quote fetches for a large symbol universe
//! in fixed-size batches over the `/quote` REST endpoint.
//!
//! - `types`: response payloads (per-symbol success/error map)
//! - `client`: reqwest client implementing the `QuoteSource` port
//! - `fetcher`: the sequential batched fetcher with flat-delay retries

pub mod client;
pub mod fetcher;
pub mod types;

pub use client::{TwelveDataClient, TwelveDataConfig};
pub use fetcher::{BatchedQuoteFetcher, FetchSettings, FetchSummary};
pub use types::{ApiErrorPayload, QuotePayload, SymbolEntry};
