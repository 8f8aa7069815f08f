#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Quote Relay - Cached Quote Distribution
//!
//! An HTTP service that fetches quotes from an upstream provider, caches
//! them briefly, and hands them to clients either on request or as a
//! server-sent event stream on a fixed poll interval.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core quote and subscription types
//!   - `quote`: Symbols, quotes, cache keys
//!   - `subscription`: Open push subscription tracking
//!   - `advice`: Portfolio snapshots and advice reports
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for the quote provider, report store, advice generator
//!   - `services`: Quote cache, subscription broadcaster, advice service
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstream`: HTTP quote provider client
//!   - `http`: Router, handlers, server lifecycle
//!   - `health`: Health, readiness and metrics routes
//!   - `config`: Environment configuration
//!
//! # Data Flow
//!
//! ```text
//!                     ┌───────────────┐
//! GET /api/quotes ───►│               │      ┌──────────┐
//!                     │  Quote Cache  │─────►│ Provider │
//! poll task (per  ───►│  (TTL, LRU)   │ miss └──────────┘
//! SSE subscriber)     └───────────────┘
//!        │
//!        └──► event: prices ──► Client
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core quote types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::advice::{
    PortfolioId, PortfolioSnapshot, RequestContext, StoredReport, UsageCounters, UserId,
};
pub use domain::quote::{CacheKeyPolicy, Quote, QuoteBatch, QuoteRequest, Symbol};
pub use domain::subscription::{SubscriptionId, SubscriptionRegistry, SubscriptionStats};

// Ports
pub use application::error::ValidationError;
pub use application::ports::{
    AdviceGeneratorPort, QuoteFetcherPort, ReportStorePort, StorageError, UpstreamError,
};

// Services
pub use application::services::{
    AdviceService, BroadcasterConfig, PriceEvent, QuoteCache, QuoteCacheConfig, Subscription,
    SubscriptionBroadcaster,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, RelayConfig};

// HTTP
pub use infrastructure::http::{AppState, HttpServer, ServerError, create_router};

// Adapters
pub use infrastructure::advice::SimulatedAdviceGenerator;
pub use infrastructure::persistence::InMemoryReportStore;
pub use infrastructure::upstream::YahooQuoteFetcher;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
