//! Batch Quote Catch-Up Integration Tests
//!
//! Drives the real REST client and the batched fetcher against a wiremock
//! server: sequential batch sweeps, retry-then-success, exhausted batches,
//! and validation errors.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quote_feed::{
    BatchProgress, BatchedQuoteFetcher, FetchSettings, PriceUpdate, QuoteSource, QuoteSourceError,
    TwelveDataClient, TwelveDataConfig,
};

fn quote_json(symbol: &str, close: &str) -> serde_json::Value {
    json!({
        "symbol": symbol,
        "name": format!("{symbol} Inc"),
        "exchange": "NASDAQ",
        "currency": "USD",
        "close": close,
        "previous_close": "100.00",
        "timestamp": 1_690_000_000,
    })
}

fn client_for(server: &MockServer) -> TwelveDataClient {
    TwelveDataClient::new(
        TwelveDataConfig::new("test-key").with_base_url(server.uri()),
    )
    .expect("client should build")
}

fn fast_settings(batch_size: usize) -> FetchSettings {
    FetchSettings {
        batch_size,
        inter_request_delay: Duration::from_millis(5),
        max_batch_retries: 2,
    }
}

fn channels() -> (
    mpsc::Sender<BatchProgress>,
    mpsc::Receiver<BatchProgress>,
    mpsc::Sender<Vec<PriceUpdate>>,
    mpsc::Receiver<Vec<PriceUpdate>>,
) {
    let (progress_tx, progress_rx) = mpsc::channel(256);
    let (updates_tx, updates_rx) = mpsc::channel(256);
    (progress_tx, progress_rx, updates_tx, updates_rx)
}

fn drain_progress(rx: &mut mpsc::Receiver<BatchProgress>) -> Vec<BatchProgress> {
    let mut progress = Vec::new();
    while let Ok(record) = rx.try_recv() {
        progress.push(record);
    }
    progress
}

// =============================================================================
// Client behavior
// =============================================================================

#[tokio::test]
async fn client_fetches_a_symbol_batch() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .and(query_param("symbol", "AAPL,MSFT"))
        .and(query_param("apikey", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AAPL": quote_json("AAPL", "189.30"),
            "MSFT": quote_json("MSFT", "410.05"),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let quotes = client
        .fetch_quotes(&["AAPL".to_string(), "MSFT".to_string()])
        .await?;

    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0].symbol, "AAPL");
    assert_eq!(quotes[0].currency, "USD");
    assert_eq!(quotes[1].price.to_string(), "410.05");
    Ok(())
}

#[tokio::test]
async fn client_surfaces_all_error_response_as_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "XXXX": {"code": 404, "message": "symbol not found", "status": "error"},
            "YYYY": {"code": 404, "message": "symbol not found", "status": "error"},
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client
        .fetch_quotes(&["XXXX".to_string(), "YYYY".to_string()])
        .await;

    match result {
        Err(QuoteSourceError::EmptyResponse { symbols }) => {
            assert_eq!(symbols, vec!["XXXX".to_string(), "YYYY".to_string()]);
        }
        other => panic!("expected EmptyResponse, got {other:?}"),
    }
}

#[tokio::test]
async fn client_maps_http_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let result = client.fetch_quotes(&["AAPL".to_string()]).await;
    assert!(matches!(result, Err(QuoteSourceError::Http(_))));
}

// =============================================================================
// Fetcher sweeps over the real client
// =============================================================================

#[tokio::test]
async fn sweep_walks_batches_sequentially() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    // 5 symbols, batch size 2: three requests with the expected partitions.
    for (symbols, body) in [
        (
            "AAPL,MSFT",
            json!({"AAPL": quote_json("AAPL", "189.30"), "MSFT": quote_json("MSFT", "410.05")}),
        ),
        (
            "TSLA,GOOGL",
            json!({"TSLA": quote_json("TSLA", "240.00"), "GOOGL": quote_json("GOOGL", "135.20")}),
        ),
        ("AMZN", quote_json("AMZN", "142.80")),
    ] {
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", symbols))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;
    }

    let fetcher = BatchedQuoteFetcher::new(
        client_for(&server),
        fast_settings(2),
        CancellationToken::new(),
    );
    let (progress_tx, mut progress_rx, updates_tx, mut updates_rx) = channels();

    let universe: Vec<String> = ["AAPL", "MSFT", "TSLA", "GOOGL", "AMZN"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let summary = fetcher
        .fetch_universe(&universe, &progress_tx, &updates_tx)
        .await;

    assert_eq!(summary.total_batches, 3);
    assert!(summary.failed_batches.is_empty());
    assert_eq!(summary.updates.len(), 5);
    assert!(!summary.cancelled);

    let progress = drain_progress(&mut progress_rx);
    assert_eq!(
        progress.iter().map(|p| p.batch).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert!(progress.iter().all(|p| p.success && p.total_batches == 3));

    // Each successful batch also lands on the bulk update lane, in order.
    let first = updates_rx.try_recv()?;
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].symbol, "AAPL");
    Ok(())
}

#[tokio::test]
async fn transient_http_failure_retries_with_delay() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    // First attempt fails, the retry succeeds.
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"AAPL": quote_json("AAPL", "189.30")})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = BatchedQuoteFetcher::new(
        client_for(&server),
        fast_settings(8),
        CancellationToken::new(),
    );
    let (progress_tx, mut progress_rx, updates_tx, _updates_rx) = channels();

    let summary = fetcher
        .fetch_universe(&["AAPL".to_string()], &progress_tx, &updates_tx)
        .await;

    assert!(summary.failed_batches.is_empty());
    assert_eq!(summary.updates.len(), 1);

    let progress = drain_progress(&mut progress_rx);
    assert_eq!(progress.len(), 2);
    assert!(!progress[0].success);
    assert_eq!(progress[0].retry_count, 1);
    assert!(progress[1].success);
    Ok(())
}

#[tokio::test]
async fn exhausted_batch_consumes_three_attempts_then_moves_on() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    // Batch 1 (AAPL,MSFT) always fails; batch 2 (TSLA) succeeds.
    Mock::given(method("GET"))
        .and(path("/quote"))
        .and(query_param("symbol", "AAPL,MSFT"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .and(query_param("symbol", "TSLA"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(quote_json("TSLA", "240.00")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = BatchedQuoteFetcher::new(
        client_for(&server),
        fast_settings(2),
        CancellationToken::new(),
    );
    let (progress_tx, mut progress_rx, updates_tx, _updates_rx) = channels();

    let universe: Vec<String> = ["AAPL", "MSFT", "TSLA"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let summary = fetcher
        .fetch_universe(&universe, &progress_tx, &updates_tx)
        .await;

    // The sweep completes normally with partial results.
    assert_eq!(summary.failed_batches, vec![1]);
    assert_eq!(summary.updates.len(), 1);
    assert_eq!(summary.updates[0].symbol, "TSLA");

    let progress = drain_progress(&mut progress_rx);
    let failures: Vec<_> = progress.iter().filter(|p| !p.success).collect();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[1].retry_count, 2);
    Ok(())
}

#[tokio::test]
async fn empty_universe_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = BatchedQuoteFetcher::new(
        client_for(&server),
        fast_settings(8),
        CancellationToken::new(),
    );
    let (progress_tx, mut progress_rx, updates_tx, _updates_rx) = channels();

    let summary = fetcher.fetch_universe(&[], &progress_tx, &updates_tx).await;

    assert_eq!(summary.total_batches, 0);
    assert!(summary.updates.is_empty());
    assert!(drain_progress(&mut progress_rx).is_empty());
}
