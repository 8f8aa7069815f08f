//! Quote Relay Binary
//!
//! Starts the quote relay HTTP service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-relay
//! ```
//!
//! # Environment Variables
//!
//! All optional. Durations longer than one day are rejected.
//! - `PORT`: HTTP listen port (default: 3001)
//! - `POLL_INTERVAL_SECONDS`: Push cadence (default: 10)
//! - `QUOTE_CACHE_TTL_SECONDS`: Cache TTL (default: poll interval - 2, min 1)
//! - `QUOTE_CACHE_CAPACITY`: Max cached symbol sets, 0 = unbounded (default: 1024)
//! - `QUOTE_CACHE_KEY_POLICY`: ordered | canonical (default: ordered)
//! - `UPSTREAM_BASE_URL`: Provider base URL (default: <https://query1.finance.yahoo.com>)
//! - `UPSTREAM_TIMEOUT_SECONDS`: Provider request timeout (default: none)
//! - `UPSTREAM_SESSION_URL`: Session cookie source, `off` to disable (default: <https://fc.yahoo.com>)
//! - `SSE_CHANNEL_CAPACITY`: Per-subscription event buffer (default: 16)
//! - `DEFAULT_USER_ID`: User for requests without `x-user-id` (default: 1)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: quote-relay)
//! - `RUST_LOG`: Log filter (default: quote_relay=info)

use std::sync::Arc;
use std::time::Duration;

use quote_relay::infrastructure::telemetry;
use quote_relay::{
    AppState, HttpServer, InMemoryReportStore, RelayConfig, SimulatedAdviceGenerator,
    YahooQuoteFetcher, create_router, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting quote relay");

    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder unavailable, /metrics disabled");
    }

    let config = RelayConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let mut fetcher = YahooQuoteFetcher::new(
        config.upstream.base_url.clone(),
        config.upstream.timeout,
    )?;
    if let Some(session_url) = &config.upstream.session_url {
        fetcher = fetcher.with_session(session_url.clone());
    }
    let fetcher = Arc::new(fetcher);
    let state = AppState::new(
        &config,
        fetcher,
        Arc::new(SimulatedAdviceGenerator::new()),
        Arc::new(InMemoryReportStore::new()),
        shutdown_token.clone(),
    );

    let server = HttpServer::bind(config.server.port, create_router(state)).await?;
    let server_handle = tokio::spawn(server.run(shutdown_token.clone()));

    tracing::info!("Quote relay ready");

    await_shutdown(shutdown_token).await;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "HTTP server error"),
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server task failed"),
        Err(_) => tracing::warn!("Graceful shutdown timed out"),
    }

    tracing::info!("Quote relay stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &RelayConfig) {
    tracing::info!(
        port = config.server.port,
        poll_interval_secs = config.poll.poll_interval.as_secs(),
        cache_ttl_secs = config.cache.ttl.as_secs(),
        cache_capacity = config.cache.capacity,
        key_policy = config.cache.key_policy.as_str(),
        "Configuration loaded"
    );
    tracing::debug!(
        upstream = %config.upstream.base_url,
        timeout_secs = config.upstream.timeout.map(|t| t.as_secs()),
        session_url = config.upstream.session_url.as_deref(),
        default_user_id = %config.default_user_id,
        "Upstream settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
