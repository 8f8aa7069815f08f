//! Advice Report Types
//!
//! Portfolio snapshots, market snapshots, stored advice reports and usage
//! counters, plus the request context that carries caller identity to
//! collaborators.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::quote::{Quote, QuoteRequest, Symbol};

// =============================================================================
// Request Context
// =============================================================================

/// Identity of the caller on whose behalf a collaborator call is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl Default for UserId {
    fn default() -> Self {
        Self(1)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Request-scoped context threaded through every collaborator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    /// The user the request acts for.
    pub user_id: UserId,
}

impl RequestContext {
    /// Create a context for the given user.
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

// =============================================================================
// Portfolio
// =============================================================================

/// One position in a portfolio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    /// Instrument symbol.
    pub symbol: String,
    /// Units held.
    #[serde(default)]
    pub quantity: Decimal,
    /// Average purchase price, if the client tracks it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<Decimal>,
    /// Client fields not interpreted by the relay, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The portfolio exactly as submitted by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    /// Portfolio display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Positions.
    #[serde(default)]
    pub holdings: Vec<Holding>,
    /// Client fields not interpreted by the relay, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PortfolioSnapshot {
    /// Symbols of all holdings in portfolio order.
    ///
    /// Returns `None` when no holding carries a usable symbol.
    #[must_use]
    pub fn quote_request(&self) -> Option<QuoteRequest> {
        let symbols: Vec<Symbol> = self
            .holdings
            .iter()
            .filter_map(|h| Symbol::parse(&h.symbol))
            .collect();
        if symbols.is_empty() {
            None
        } else {
            Some(QuoteRequest::new(symbols))
        }
    }
}

/// Client-side portfolio identifier. Clients send either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortfolioId {
    /// Numeric identifier.
    Number(i64),
    /// Free-form identifier.
    Text(String),
}

impl std::fmt::Display for PortfolioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => n.fmt(f),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Quotes keyed by symbol, as seen when advice was generated.
pub type MarketSnapshot = BTreeMap<String, Quote>;

/// Key a batch of quotes by symbol. Later duplicates win.
#[must_use]
pub fn market_snapshot(quotes: &[Quote]) -> MarketSnapshot {
    quotes
        .iter()
        .map(|q| (q.symbol.clone(), q.clone()))
        .collect()
}

// =============================================================================
// Reports
// =============================================================================

/// A report to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    /// Client-side portfolio identifier.
    pub portfolio_id: Option<PortfolioId>,
    /// Generated advice text (markdown).
    pub advice: String,
    /// Quotes the advice was based on.
    pub market_snapshot: MarketSnapshot,
    /// Portfolio the advice was based on.
    pub portfolio_snapshot: PortfolioSnapshot,
}

/// A persisted advice report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    /// Report identifier.
    pub id: Uuid,
    /// Owner.
    pub user_id: UserId,
    /// Client-side portfolio identifier.
    pub portfolio_id: Option<PortfolioId>,
    /// Generated advice text (markdown).
    pub advice: String,
    /// Quotes the advice was based on.
    pub market_snapshot: MarketSnapshot,
    /// Portfolio the advice was based on.
    pub portfolio_snapshot: PortfolioSnapshot,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Usage
// =============================================================================

/// Per-user activity counters shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Advice reports generated.
    pub reports_generated: u64,
    /// Questions asked about reports.
    pub questions_asked: u64,
}
