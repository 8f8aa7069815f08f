//! Quote Domain Types
//!
//! Symbols, normalized quotes and the cache key derived from a requested
//! symbol list.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// =============================================================================
// Symbol
// =============================================================================

/// A ticker identifying a tradable instrument (e.g. `TCS.NS`, `AAPL`).
///
/// Surrounding whitespace is trimmed; case is preserved because provider
/// symbols are case-sensitive for some exchanges.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Create a new symbol, returning `None` if it is blank.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the symbol string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Quote
// =============================================================================

/// Normalized price and metadata snapshot for one symbol.
///
/// Any field the provider omitted is `None` and serializes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Instrument symbol as reported by the provider.
    pub symbol: String,
    /// Human-readable instrument name.
    #[serde(rename = "name")]
    pub display_name: Option<String>,
    /// Last traded price.
    pub price: Option<f64>,
    /// Change since previous close, in percent.
    pub change_percent: Option<f64>,
    /// Listing exchange code.
    pub exchange: Option<String>,
    /// Quote currency.
    pub currency: Option<String>,
}

/// An immutable, shareable batch of quotes in provider order.
pub type QuoteBatch = Arc<[Quote]>;

/// Build an empty batch.
#[must_use]
pub fn empty_batch() -> QuoteBatch {
    Arc::from(Vec::new())
}

// =============================================================================
// Quote Request
// =============================================================================

/// How a requested symbol list is turned into a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheKeyPolicy {
    /// Join symbols in the order supplied. `[A, B]` and `[B, A]` are distinct
    /// entries.
    #[default]
    Ordered,
    /// Sort and deduplicate before joining; every ordering of a set shares
    /// one entry.
    Canonical,
}

impl CacheKeyPolicy {
    /// Parse a policy name, falling back to [`CacheKeyPolicy::Ordered`].
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "canonical" | "sorted" => Self::Canonical,
            _ => Self::Ordered,
        }
    }

    /// Get the policy name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ordered => "ordered",
            Self::Canonical => "canonical",
        }
    }
}

/// An ordered list of symbols submitted together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    symbols: Vec<Symbol>,
}

impl QuoteRequest {
    /// Create a request from already-parsed symbols.
    #[must_use]
    pub const fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    /// Parse a comma-separated ticker list, skipping blank segments.
    ///
    /// Returns `None` when no symbol survives.
    #[must_use]
    pub fn from_csv(csv: &str) -> Option<Self> {
        let symbols: Vec<Symbol> = csv.split(',').filter_map(Symbol::parse).collect();
        if symbols.is_empty() {
            None
        } else {
            Some(Self { symbols })
        }
    }

    /// Symbols in the order supplied.
    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Whether the request has no symbols.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Apply a key policy, returning the request that will actually be
    /// fetched.
    #[must_use]
    pub fn normalized(&self, policy: CacheKeyPolicy) -> Self {
        match policy {
            CacheKeyPolicy::Ordered => self.clone(),
            CacheKeyPolicy::Canonical => {
                let set: BTreeSet<Symbol> = self.symbols.iter().cloned().collect();
                Self {
                    symbols: set.into_iter().collect(),
                }
            }
        }
    }

    /// Deterministic cache key under the given policy.
    #[must_use]
    pub fn cache_key(&self, policy: CacheKeyPolicy) -> String {
        self.normalized(policy).joined()
    }

    /// Comma-joined symbols in their current order.
    #[must_use]
    pub fn joined(&self) -> String {
        self.symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for QuoteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}
