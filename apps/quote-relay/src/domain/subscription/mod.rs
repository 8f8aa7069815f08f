//! Subscription Tracking
//!
//! Bookkeeping for open push subscriptions. Each subscription owns one
//! recurring poll task; the registry records which symbols are being watched
//! so health and metrics can report on them.
//!
//! # Design
//!
//! The registry tracks:
//! - Which symbols each subscription requested
//! - Reference counts per symbol across all subscriptions
//!
//! Releasing a subscription is idempotent so the poll task and the transport
//! teardown can both call it without double-counting.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::domain::quote::{QuoteRequest, Symbol};

// =============================================================================
// Types
// =============================================================================

/// Unique identifier for a push subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A registered subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionRecord {
    /// Requested symbols in the order supplied.
    pub request: QuoteRequest,
    /// When the subscription was opened.
    pub opened_at: DateTime<Utc>,
}

/// Snapshot of registry statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionStats {
    /// Number of open subscriptions.
    pub active: usize,
    /// Number of distinct symbols watched across all subscriptions.
    pub distinct_symbols: usize,
}

#[derive(Debug, Default)]
struct RegistryState {
    subscriptions: HashMap<SubscriptionId, SubscriptionRecord>,
    symbol_refcount: HashMap<Symbol, usize>,
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Thread-safe registry of open subscriptions.
///
/// # Example
///
/// ```rust
/// use quote_relay::domain::quote::QuoteRequest;
/// use quote_relay::domain::subscription::{SubscriptionId, SubscriptionRegistry};
///
/// let registry = SubscriptionRegistry::new();
/// let id = SubscriptionId::new();
///
/// registry.register(id, QuoteRequest::from_csv("AAA,BBB").unwrap());
/// assert_eq!(registry.stats().active, 1);
///
/// assert!(registry.release(id));
/// assert!(!registry.release(id));
/// assert_eq!(registry.stats().active, 0);
/// ```
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    state: RwLock<RegistryState>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription.
    pub fn register(&self, id: SubscriptionId, request: QuoteRequest) {
        let mut state = self.state.write();

        // Count each symbol once per subscription even if it was repeated.
        let mut seen = Vec::new();
        for symbol in request.symbols() {
            if seen.contains(&symbol) {
                continue;
            }
            seen.push(symbol);
            *state.symbol_refcount.entry(symbol.clone()).or_insert(0) += 1;
        }

        state.subscriptions.insert(
            id,
            SubscriptionRecord {
                request,
                opened_at: Utc::now(),
            },
        );
    }

    /// Release a subscription.
    ///
    /// Returns `true` if the subscription was registered, `false` if it was
    /// already released.
    pub fn release(&self, id: SubscriptionId) -> bool {
        let mut state = self.state.write();
        let Some(record) = state.subscriptions.remove(&id) else {
            return false;
        };

        let mut seen = Vec::new();
        for symbol in record.request.symbols() {
            if seen.contains(&symbol) {
                continue;
            }
            seen.push(symbol);

            if let Some(refcount) = state.symbol_refcount.get_mut(symbol) {
                *refcount = refcount.saturating_sub(1);
                if *refcount == 0 {
                    state.symbol_refcount.remove(symbol);
                }
            }
        }

        true
    }

    /// Check whether a subscription is open.
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.state.read().subscriptions.contains_key(&id)
    }

    /// Get the record for an open subscription.
    #[must_use]
    pub fn get(&self, id: SubscriptionId) -> Option<SubscriptionRecord> {
        self.state.read().subscriptions.get(&id).cloned()
    }

    /// All symbols with at least one open subscription, sorted.
    #[must_use]
    pub fn watched_symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.state.read().symbol_refcount.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> SubscriptionStats {
        let state = self.state.read();
        SubscriptionStats {
            active: state.subscriptions.len(),
            distinct_symbols: state.symbol_refcount.len(),
        }
    }
}
