//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `QuoteCache`: TTL cache in front of the quote fetcher
//! - `SubscriptionBroadcaster`: Per-subscription poll tasks for push clients
//! - `AdviceService`: Report generation for submitted portfolios

mod advice;
mod broadcaster;
mod quote_cache;

pub use advice::{AdviceService, AdviceServiceError, FALLBACK_ADVICE};
pub use broadcaster::{BroadcasterConfig, PriceEvent, Subscription, SubscriptionBroadcaster};
pub use quote_cache::{DEFAULT_CACHE_CAPACITY, QuoteCache, QuoteCacheConfig, UpstreamState};
