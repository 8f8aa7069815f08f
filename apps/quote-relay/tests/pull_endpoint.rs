//! Pull Endpoint Integration Tests
//!
//! `GET /api/quotes` through the full router: validation, caching and
//! failure absorption.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{test_app, test_app_with};
use quote_relay::{CacheKeyPolicy, RelayConfig};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(router: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router.clone().oneshot(get(uri)).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn expected_pair() -> Value {
    json!([
        {
            "symbol": "AAA",
            "name": "AAA Corp",
            "price": 100.0,
            "changePercent": 1.5,
            "exchange": "NMS",
            "currency": "USD"
        },
        {
            "symbol": "BBB",
            "name": "BBB Corp",
            "price": 50.0,
            "changePercent": -2.0,
            "exchange": "NMS",
            "currency": "USD"
        }
    ])
}

#[tokio::test]
async fn returns_fetcher_batch_verbatim_and_caches_it() {
    let app = test_app();

    let (status, first) = send(&app.router, "/api/quotes?tickers=AAA,BBB").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, expected_pair());

    let (status, second) = send(&app.router, "/api/quotes?tickers=AAA,BBB").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second, first);

    assert_eq!(app.fetcher.calls(), 1);
}

#[tokio::test]
async fn missing_tickers_is_rejected_without_fetch() {
    let app = test_app();

    let (status, body) = send(&app.router, "/api/quotes").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Tickers query parameter is required." }));
    assert_eq!(app.fetcher.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn refetches_once_after_ttl() {
    let app = test_app();

    send(&app.router, "/api/quotes?tickers=AAA").await;
    tokio::time::advance(Duration::from_secs(7)).await;
    send(&app.router, "/api/quotes?tickers=AAA").await;
    assert_eq!(app.fetcher.calls(), 1);

    tokio::time::advance(Duration::from_secs(2)).await;
    send(&app.router, "/api/quotes?tickers=AAA").await;
    send(&app.router, "/api/quotes?tickers=AAA").await;
    assert_eq!(app.fetcher.calls(), 2);
}

#[tokio::test]
async fn failure_returns_empty_array_and_is_not_cached() {
    let app = test_app();
    app.fetcher.set_failing(true);

    let (status, body) = send(&app.router, "/api/quotes?tickers=AAA").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    app.fetcher.set_failing(false);
    let (_, body) = send(&app.router, "/api/quotes?tickers=AAA").await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(app.fetcher.calls(), 2);
}

#[tokio::test]
async fn ordered_policy_keys_permutations_separately() {
    let app = test_app();

    send(&app.router, "/api/quotes?tickers=AAA,BBB").await;
    let (_, reversed) = send(&app.router, "/api/quotes?tickers=BBB,AAA").await;

    assert_eq!(app.fetcher.calls(), 2);
    assert_eq!(reversed[0]["symbol"], "BBB");
}

#[tokio::test]
async fn canonical_policy_shares_permutations() {
    let mut config = RelayConfig::default();
    config.cache.key_policy = CacheKeyPolicy::Canonical;
    let app = test_app_with(&config);

    send(&app.router, "/api/quotes?tickers=BBB,AAA,BBB").await;
    send(&app.router, "/api/quotes?tickers=AAA,BBB").await;

    assert_eq!(app.fetcher.calls(), 1);
    assert_eq!(*app.fetcher.last_symbols.lock(), vec!["AAA", "BBB"]);
}

#[tokio::test]
async fn whitespace_around_symbols_is_trimmed() {
    let app = test_app();

    let (_, body) = send(&app.router, "/api/quotes?tickers=%20AAA%20,BBB").await;

    assert_eq!(body, expected_pair());
}
