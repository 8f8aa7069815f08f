//! Health Check and Metrics Endpoints
//!
//! Health reporting and Prometheus metrics, served on the main HTTP port.
//!
//! # Endpoints
//!
//! - `GET /health` - Returns JSON health status
//! - `GET /healthz` - Liveness probe (simple OK)
//! - `GET /readyz` - Readiness probe (fails while the provider is failing)
//! - `GET /metrics` - Prometheus metrics in text format

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::application::services::{QuoteCache, UpstreamState};
use crate::infrastructure::http::AppState;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Health Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Provider call history.
    pub upstream: UpstreamStatus,
    /// Cache occupancy and tuning.
    pub cache: CacheStatus,
    /// Push subscription statistics.
    pub subscriptions: SubscriptionStatus,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Provider answering.
    Healthy,
    /// Provider failing; cached data and empty results are being served.
    Degraded,
}

/// Provider call history.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamStatus {
    /// Time of the last successful call.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Time of the last failed call.
    pub last_error_at: Option<DateTime<Utc>>,
    /// Message of the last failed call.
    pub last_error: Option<String>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

/// Cache occupancy and tuning.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    /// Stored entries.
    pub entries: usize,
    /// Maximum entries (0 = unbounded).
    pub capacity: usize,
    /// Entry lifetime in seconds.
    pub ttl_secs: u64,
    /// Key policy name.
    pub key_policy: &'static str,
}

/// Push subscription statistics.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
    /// Open subscriptions.
    pub active: usize,
    /// Distinct symbols across open subscriptions.
    pub distinct_symbols: usize,
}

// =============================================================================
// Routes
// =============================================================================

/// Health and metrics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(build_health_response(&state)))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<AppState>) -> impl IntoResponse {
    if is_ready(state.cache.upstream()) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

// =============================================================================
// Status Assembly
// =============================================================================

fn build_health_response(state: &AppState) -> HealthResponse {
    let upstream = upstream_status(state.cache.upstream());
    let stats = state.broadcaster.registry().stats();

    HealthResponse {
        status: determine_health_status(&upstream),
        version: state.version.to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        upstream,
        cache: cache_status(&state.cache),
        subscriptions: SubscriptionStatus {
            active: stats.active,
            distinct_symbols: stats.distinct_symbols,
        },
    }
}

fn upstream_status(state: &UpstreamState) -> UpstreamStatus {
    let (last_error_at, last_error) = state
        .last_error()
        .map_or((None, None), |(at, message)| (Some(at), Some(message)));

    UpstreamStatus {
        last_success_at: state.last_success_at(),
        last_error_at,
        last_error,
        consecutive_failures: state.consecutive_failures(),
    }
}

fn cache_status(cache: &QuoteCache) -> CacheStatus {
    let config = cache.config();
    CacheStatus {
        entries: cache.len(),
        capacity: config.capacity,
        ttl_secs: config.ttl.as_secs(),
        key_policy: config.key_policy.as_str(),
    }
}

const fn determine_health_status(upstream: &UpstreamStatus) -> HealthStatus {
    if upstream.consecutive_failures == 0 {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    }
}

fn is_ready(upstream: &UpstreamState) -> bool {
    upstream.consecutive_failures() == 0
}

// =============================================================================
// Tests
// =============================================================================
