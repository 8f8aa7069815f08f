//! Shared fixtures for router integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;

use quote_relay::{
    AppState, InMemoryReportStore, Quote, QuoteFetcherPort, RelayConfig, SimulatedAdviceGenerator,
    Symbol, UpstreamError, create_router,
};

/// Fetcher returning a fixed table of quotes, counting calls.
#[derive(Default)]
pub struct StubFetcher {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
    pub last_symbols: parking_lot::Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

pub fn stub_quote(symbol: &str) -> Quote {
    let (price, change) = match symbol {
        "AAA" => (100.0, 1.5),
        "BBB" => (50.0, -2.0),
        _ => (10.0, 0.0),
    };
    Quote {
        symbol: symbol.to_string(),
        display_name: Some(format!("{symbol} Corp")),
        price: Some(price),
        change_percent: Some(change),
        exchange: Some("NMS".to_string()),
        currency: Some("USD".to_string()),
    }
}

#[async_trait]
impl QuoteFetcherPort for StubFetcher {
    async fn fetch(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_symbols.lock() = symbols.iter().map(|s| s.as_str().to_string()).collect();
        if self.fail.load(Ordering::SeqCst) {
            return Err(UpstreamError::Transport("connection reset".to_string()));
        }
        Ok(symbols.iter().map(|s| stub_quote(s.as_str())).collect())
    }
}

pub struct TestApp {
    pub router: Router,
    pub fetcher: Arc<StubFetcher>,
    pub state: AppState,
    pub shutdown: CancellationToken,
}

pub fn test_app() -> TestApp {
    test_app_with(&RelayConfig::default())
}

pub fn test_app_with(config: &RelayConfig) -> TestApp {
    let fetcher = Arc::new(StubFetcher::default());
    let shutdown = CancellationToken::new();
    let state = AppState::new(
        config,
        Arc::clone(&fetcher) as Arc<dyn QuoteFetcherPort>,
        Arc::new(SimulatedAdviceGenerator::new()),
        Arc::new(InMemoryReportStore::new()),
        shutdown.clone(),
    );
    TestApp {
        router: create_router(state.clone()),
        fetcher,
        state,
        shutdown,
    }
}
