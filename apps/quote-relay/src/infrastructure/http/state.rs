//! Shared state for HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AdviceGeneratorPort, QuoteFetcherPort, ReportStorePort};
use crate::application::services::{AdviceService, QuoteCache, SubscriptionBroadcaster};
use crate::domain::advice::{RequestContext, UserId};
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::config::RelayConfig;

/// Header naming the acting user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// State shared by all routes.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Quote cache in front of the provider.
    pub cache: Arc<QuoteCache>,
    /// Push subscription owner.
    pub broadcaster: Arc<SubscriptionBroadcaster>,
    /// Advice report service.
    pub advice: Arc<AdviceService>,
    /// Identity used when a request names none.
    pub default_user_id: UserId,
    /// Service version reported by `/health`.
    pub version: &'static str,
    /// Process start, for uptime.
    pub started_at: Instant,
}

impl AppState {
    /// Wire services from configuration and adapters.
    ///
    /// Push subscriptions end when `shutdown` is cancelled.
    #[must_use]
    pub fn new(
        config: &RelayConfig,
        fetcher: Arc<dyn QuoteFetcherPort>,
        generator: Arc<dyn AdviceGeneratorPort>,
        store: Arc<dyn ReportStorePort>,
        shutdown: CancellationToken,
    ) -> Self {
        let cache = Arc::new(QuoteCache::new(fetcher, config.cache_config()));
        let broadcaster = Arc::new(SubscriptionBroadcaster::new(
            Arc::clone(&cache),
            Arc::new(SubscriptionRegistry::new()),
            config.broadcaster_config(),
            shutdown,
        ));
        let advice = Arc::new(AdviceService::new(Arc::clone(&cache), generator, store));

        Self {
            cache,
            broadcaster,
            advice,
            default_user_id: config.default_user_id,
            version: env!("CARGO_PKG_VERSION"),
            started_at: Instant::now(),
        }
    }

    /// Resolve the acting user from request headers.
    ///
    /// A missing or unparseable header falls back to the default user.
    #[must_use]
    pub fn request_context(&self, headers: &HeaderMap) -> RequestContext {
        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .map_or(self.default_user_id, UserId);
        RequestContext::new(user_id)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;
    use crate::application::ports::{MockAdviceGeneratorPort, MockQuoteFetcherPort, MockReportStorePort};

    fn state() -> AppState {
        AppState::new(
            &RelayConfig::default(),
            Arc::new(MockQuoteFetcherPort::new()),
            Arc::new(MockAdviceGeneratorPort::new()),
            Arc::new(MockReportStorePort::new()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn context_from_header_or_default() {
        let state = state();

        let mut headers = HeaderMap::new();
        assert_eq!(state.request_context(&headers).user_id, UserId(1));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        assert_eq!(state.request_context(&headers).user_id, UserId(42));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("alice"));
        assert_eq!(state.request_context(&headers).user_id, UserId(1));
    }
}
