//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `QuoteFetcherPort`: Batched quote lookup against the upstream provider
//! - `ReportStorePort`: Persistence for generated advice reports and usage counters
//! - `AdviceGeneratorPort`: Produces advice text for a portfolio

use async_trait::async_trait;

use crate::domain::advice::{
    MarketSnapshot, NewReport, PortfolioSnapshot, RequestContext, StoredReport, UsageCounters,
};
use crate::domain::quote::{Quote, Symbol};

// =============================================================================
// Quote Fetcher
// =============================================================================

/// Upstream provider failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("upstream transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("upstream returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The provider reported an error in its payload.
    #[error("upstream reported error: {0}")]
    Provider(String),

    /// The response body could not be decoded.
    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Status { .. } => "status",
            Self::Provider(_) => "provider",
            Self::Decode(_) => "decode",
        }
    }
}

/// Port for fetching a batch of quotes from the external price source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteFetcherPort: Send + Sync {
    /// Fetch quotes for the given symbols in a single upstream call.
    ///
    /// Fields the provider omits are returned as `None`; a missing field
    /// never fails the batch.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError` when the provider call fails.
    async fn fetch(&self, symbols: &[Symbol]) -> Result<Vec<Quote>, UpstreamError>;
}

// =============================================================================
// Report Store
// =============================================================================

/// Report persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The store could not be reached.
    #[error("report store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the write.
    #[error("report store rejected write: {0}")]
    Rejected(String),
}

/// Port for persisting advice reports.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportStorePort: Send + Sync {
    /// Persist a report on behalf of the context's user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the write fails.
    async fn store_report(
        &self,
        ctx: &RequestContext,
        report: NewReport,
    ) -> Result<StoredReport, StorageError>;

    /// List the context user's reports, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn list_reports(&self, ctx: &RequestContext) -> Result<Vec<StoredReport>, StorageError>;

    /// Count one more generated report for the context's user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the counter cannot be updated.
    async fn increment_reports_generated(
        &self,
        ctx: &RequestContext,
    ) -> Result<UsageCounters, StorageError>;

    /// The context user's usage counters. Users without activity read as zero.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the read fails.
    async fn usage(&self, ctx: &RequestContext) -> Result<UsageCounters, StorageError>;
}

// =============================================================================
// Advice Generator
// =============================================================================

/// Advice generation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("advice generation failed: {0}")]
pub struct AdviceError(pub String);

/// Port for producing advice text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdviceGeneratorPort: Send + Sync {
    /// Produce markdown advice for a portfolio given current market data.
    ///
    /// # Errors
    ///
    /// Returns `AdviceError` if the generator fails.
    async fn generate(
        &self,
        ctx: &RequestContext,
        portfolio: &PortfolioSnapshot,
        market: &MarketSnapshot,
    ) -> Result<String, AdviceError>;
}
