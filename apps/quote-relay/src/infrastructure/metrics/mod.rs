//! Prometheus Metrics Module
//!
//! Exposes application metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Cache**: Hits, misses and capacity evictions
//! - **Upstream**: Provider calls, failures by kind and call latency
//! - **Subscriptions**: Active push subscriptions, events sent and dropped
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port. Recording
//! before [`init_metrics`] is a no-op.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Subsequent calls return the handle installed by the first.
///
/// # Errors
///
/// Returns `BuildError` if the global recorder cannot be installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Cache
    describe_counter!("quote_relay_cache_hits_total", "Quote requests served from cache");
    describe_counter!(
        "quote_relay_cache_misses_total",
        "Quote requests that required an upstream call"
    );
    describe_counter!(
        "quote_relay_cache_evictions_total",
        "Cache entries evicted to stay within capacity"
    );

    // Upstream
    describe_counter!(
        "quote_relay_upstream_requests_total",
        "Total calls to the quote provider"
    );
    describe_counter!(
        "quote_relay_upstream_errors_total",
        "Failed quote provider calls by kind"
    );
    describe_histogram!(
        "quote_relay_upstream_request_seconds",
        "Quote provider call latency"
    );

    // Subscriptions
    describe_gauge!(
        "quote_relay_active_subscriptions",
        "Number of open push subscriptions"
    );
    describe_counter!(
        "quote_relay_events_sent_total",
        "Price events delivered to push subscribers"
    );
    describe_counter!(
        "quote_relay_events_dropped_total",
        "Price events dropped due to slow subscribers"
    );
    describe_counter!(
        "quote_relay_ticks_skipped_total",
        "Poll ticks that produced no event, by reason"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a cache hit.
pub fn record_cache_hit() {
    counter!("quote_relay_cache_hits_total").increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!("quote_relay_cache_misses_total").increment(1);
}

/// Record entries evicted for capacity.
pub fn record_cache_evictions(count: u64) {
    counter!("quote_relay_cache_evictions_total").increment(count);
}

/// Record a call to the quote provider.
pub fn record_upstream_request() {
    counter!("quote_relay_upstream_requests_total").increment(1);
}

/// Record a failed provider call.
pub fn record_upstream_error(kind: &str) {
    counter!(
        "quote_relay_upstream_errors_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record provider call latency.
pub fn record_upstream_duration(duration: Duration) {
    histogram!("quote_relay_upstream_request_seconds").record(duration.as_secs_f64());
}

/// Update the open subscription count.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_subscriptions(count: usize) {
    gauge!("quote_relay_active_subscriptions").set(count as f64);
}

/// Record a price event delivered to a subscriber.
pub fn record_event_sent() {
    counter!("quote_relay_events_sent_total").increment(1);
}

/// Record a price event dropped because the subscriber's buffer was full.
pub fn record_event_dropped() {
    counter!("quote_relay_events_dropped_total").increment(1);
}

/// Record a tick that produced no event.
pub fn record_tick_skipped(reason: &'static str) {
    counter!(
        "quote_relay_ticks_skipped_total",
        "reason" => reason
    )
    .increment(1);
}

// =============================================================================
// Tests
// =============================================================================
