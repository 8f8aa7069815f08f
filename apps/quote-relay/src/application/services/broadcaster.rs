//! Subscription Broadcaster
//!
//! Runs one poll task per push subscription. Each task ticks at the process
//! poll interval, asks the quote cache for the subscription's symbols and
//! forwards non-empty batches to the client's channel.
//!
//! # Lifecycle
//!
//! ```text
//! subscribe ──► register ──► spawn poll task ──► tick ─► cache ─► send
//!                                   │
//!          channel closed / cancel / shutdown
//!                                   ▼
//!                      stop timer ──► release ──► close channel
//! ```
//!
//! A subscription ends when the receiving side is dropped (client
//! disconnected), when [`Subscription`] is dropped, or when the process
//! shutdown token fires. A fetch already in flight when that happens runs to
//! completion and its result is discarded.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::quote_cache::QuoteCache;
use crate::application::error::ValidationError;
use crate::domain::quote::{QuoteBatch, QuoteRequest};
use crate::domain::subscription::{SubscriptionId, SubscriptionRegistry};
use crate::infrastructure::metrics;

// =============================================================================
// Events
// =============================================================================

/// An event delivered to a push subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceEvent {
    /// A fresh batch of quotes.
    Prices(QuoteBatch),
    /// The subscription could not be served. The stream ends after this.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

// =============================================================================
// Configuration
// =============================================================================

/// Broadcaster tuning.
#[derive(Debug, Clone, Copy)]
pub struct BroadcasterConfig {
    /// Interval between polls for every subscription.
    pub poll_interval: Duration,
    /// Events buffered per subscription before new batches are dropped.
    pub channel_capacity: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            channel_capacity: 16,
        }
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// Receiving end of a push subscription.
///
/// Yields [`PriceEvent`]s until the subscription ends. Dropping it cancels
/// the poll task.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    events: mpsc::Receiver<PriceEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Subscription identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event. Returns `None` once the subscription ended.
    pub async fn recv(&mut self) -> Option<PriceEvent> {
        self.events.recv().await
    }

    /// Stop the poll task. Already-buffered events remain readable.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Stream for Subscription {
    type Item = PriceEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// =============================================================================
// Broadcaster
// =============================================================================

/// Owns the poll tasks for all push subscriptions.
#[derive(Debug)]
pub struct SubscriptionBroadcaster {
    cache: Arc<QuoteCache>,
    registry: Arc<SubscriptionRegistry>,
    config: BroadcasterConfig,
    shutdown: CancellationToken,
}

impl SubscriptionBroadcaster {
    /// Create a broadcaster. Every subscription is cancelled when `shutdown`
    /// fires.
    #[must_use]
    pub const fn new(
        cache: Arc<QuoteCache>,
        registry: Arc<SubscriptionRegistry>,
        config: BroadcasterConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cache,
            registry,
            config,
            shutdown,
        }
    }

    /// Subscription registry.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Broadcaster configuration.
    #[must_use]
    pub const fn config(&self) -> &BroadcasterConfig {
        &self.config
    }

    /// Open a subscription for the given symbols.
    ///
    /// An empty request yields a subscription that delivers a single
    /// [`PriceEvent::Error`] and then ends.
    #[must_use]
    pub fn subscribe(&self, request: QuoteRequest) -> Subscription {
        let id = SubscriptionId::new();
        let cancel = self.shutdown.child_token();
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));

        if request.is_empty() {
            tracing::warn!(subscription_id = %id, "Subscription rejected: no tickers");
            // Capacity is at least one, so this cannot fail.
            let _ = tx.try_send(PriceEvent::Error {
                message: ValidationError::NoTickers.to_string(),
            });
            return Subscription {
                id,
                events: rx,
                cancel,
            };
        }

        self.registry.register(id, request.clone());
        metrics::set_active_subscriptions(self.registry.stats().active);
        tracing::info!(subscription_id = %id, tickers = %request, "Client connected");

        let task = PollTask {
            id,
            request,
            cache: Arc::clone(&self.cache),
            tx,
            cancel: cancel.clone(),
            poll_interval: self.config.poll_interval,
        };
        let guard = ReleaseGuard {
            id,
            registry: Arc::clone(&self.registry),
        };

        tokio::spawn(async move {
            let _guard = guard;
            task.run().await;
        });

        Subscription {
            id,
            events: rx,
            cancel,
        }
    }
}

// =============================================================================
// Poll Task
// =============================================================================

struct PollTask {
    id: SubscriptionId,
    request: QuoteRequest,
    cache: Arc<QuoteCache>,
    tx: mpsc::Sender<PriceEvent>,
    cancel: CancellationToken,
    poll_interval: Duration,
}

impl PollTask {
    async fn run(self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = self.tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let batch = match self.cache.get_or_fetch(&self.request).await {
                Ok(batch) if !batch.is_empty() => batch,
                Ok(_) => {
                    metrics::record_tick_skipped("empty");
                    tracing::debug!(subscription_id = %self.id, "Empty batch, skipping tick");
                    continue;
                }
                Err(e) => {
                    metrics::record_tick_skipped("upstream_error");
                    tracing::debug!(subscription_id = %self.id, error = %e, "Fetch failed, skipping tick");
                    continue;
                }
            };

            if self.cancel.is_cancelled() || self.tx.is_closed() {
                break;
            }

            match self.tx.try_send(PriceEvent::Prices(batch)) {
                Ok(()) => metrics::record_event_sent(),
                Err(TrySendError::Full(_)) => {
                    metrics::record_event_dropped();
                    tracing::warn!(subscription_id = %self.id, "Subscriber lagging, dropped price event");
                }
                Err(TrySendError::Closed(_)) => break,
            }
        }
    }
}

/// Releases the subscription exactly once when the poll task ends, however it
/// ends.
struct ReleaseGuard {
    id: SubscriptionId,
    registry: Arc<SubscriptionRegistry>,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if self.registry.release(self.id) {
            metrics::set_active_subscriptions(self.registry.stats().active);
            tracing::info!(subscription_id = %self.id, "Client disconnected");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
