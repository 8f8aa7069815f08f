//! Advice Service
//!
//! Builds an advice report for a submitted portfolio: looks up quotes for
//! its holdings through the shared cache, asks the generator for advice text
//! and persists the result on behalf of the caller. Each saved report bumps
//! the caller's usage counters.

use std::sync::Arc;

use super::quote_cache::QuoteCache;
use crate::application::error::ValidationError;
use crate::application::ports::{AdviceGeneratorPort, ReportStorePort, StorageError};
use crate::domain::advice::{
    NewReport, PortfolioId, PortfolioSnapshot, RequestContext, StoredReport, UsageCounters,
    market_snapshot,
};

/// Advice text used when the generator fails.
pub const FALLBACK_ADVICE: &str = "There was an error generating advice. Please try again later.";

/// Advice request failure.
#[derive(Debug, thiserror::Error)]
pub enum AdviceServiceError {
    /// The request was rejected before any work was done.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The report could not be saved.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Orchestrates quote lookup, advice generation and report storage.
pub struct AdviceService {
    cache: Arc<QuoteCache>,
    generator: Arc<dyn AdviceGeneratorPort>,
    store: Arc<dyn ReportStorePort>,
}

impl std::fmt::Debug for AdviceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdviceService").finish_non_exhaustive()
    }
}

impl AdviceService {
    /// Create a new advice service.
    #[must_use]
    pub fn new(
        cache: Arc<QuoteCache>,
        generator: Arc<dyn AdviceGeneratorPort>,
        store: Arc<dyn ReportStorePort>,
    ) -> Self {
        Self {
            cache,
            generator,
            store,
        }
    }

    /// Generate and store a report for the given portfolio.
    ///
    /// Upstream quote failures yield an empty market snapshot and generator
    /// failures yield [`FALLBACK_ADVICE`]; neither fails the request. A usage
    /// counter that cannot be updated is logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the portfolio is missing or has no holdings,
    /// and `Storage` when the report cannot be saved.
    pub async fn generate_report(
        &self,
        ctx: &RequestContext,
        portfolio: Option<PortfolioSnapshot>,
        portfolio_id: Option<PortfolioId>,
    ) -> Result<StoredReport, AdviceServiceError> {
        let portfolio = portfolio
            .filter(|p| !p.holdings.is_empty())
            .ok_or(ValidationError::MissingPortfolio)?;

        tracing::info!(
            user_id = %ctx.user_id,
            holdings = portfolio.holdings.len(),
            "Generating advice"
        );

        let quotes = match portfolio.quote_request() {
            Some(request) => self.cache.get_or_empty(&request).await,
            None => crate::domain::quote::empty_batch(),
        };
        let market = market_snapshot(&quotes);

        let advice = match self.generator.generate(ctx, &portfolio, &market).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(user_id = %ctx.user_id, error = %e, "Advice generation failed");
                FALLBACK_ADVICE.to_string()
            }
        };

        let report = NewReport {
            portfolio_id,
            advice,
            market_snapshot: market,
            portfolio_snapshot: portfolio,
        };

        let stored = self.store.store_report(ctx, report).await.map_err(|e| {
            tracing::error!(user_id = %ctx.user_id, error = %e, "Failed to save report");
            e
        })?;

        tracing::info!(user_id = %ctx.user_id, report_id = %stored.id, "Report saved");

        if let Err(e) = self.store.increment_reports_generated(ctx).await {
            tracing::warn!(user_id = %ctx.user_id, error = %e, "Failed to update usage counters");
        }

        Ok(stored)
    }

    /// The caller's reports, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn list_reports(&self, ctx: &RequestContext) -> Result<Vec<StoredReport>, StorageError> {
        self.store.list_reports(ctx).await
    }

    /// The caller's usage counters.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be read.
    pub async fn usage(&self, ctx: &RequestContext) -> Result<UsageCounters, StorageError> {
        self.store.usage(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mockall::predicate::always;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::*;
    use crate::application::ports::{
        AdviceError, MockAdviceGeneratorPort, MockQuoteFetcherPort, MockReportStorePort,
        QuoteFetcherPort, UpstreamError,
    };
    use crate::application::services::quote_cache::QuoteCacheConfig;
    use crate::domain::advice::{Holding, UserId};
    use crate::domain::quote::Quote;

    fn ctx() -> RequestContext {
        RequestContext::new(UserId(42))
    }

    fn portfolio(symbols: &[&str]) -> PortfolioSnapshot {
        PortfolioSnapshot {
            name: None,
            extra: serde_json::Map::new(),
            holdings: symbols
                .iter()
                .map(|s| Holding {
                    symbol: (*s).to_string(),
                    quantity: Decimal::TEN,
                    avg_price: None,
                    extra: serde_json::Map::new(),
                })
                .collect(),
        }
    }

    fn cache_with(fetcher: MockQuoteFetcherPort) -> Arc<QuoteCache> {
        Arc::new(QuoteCache::new(
            Arc::new(fetcher) as Arc<dyn QuoteFetcherPort>,
            QuoteCacheConfig::default(),
        ))
    }

    fn echo_store() -> MockReportStorePort {
        let mut store = MockReportStorePort::new();
        store.expect_store_report().returning(|ctx, report| {
            Ok(StoredReport {
                id: Uuid::new_v4(),
                user_id: ctx.user_id,
                portfolio_id: report.portfolio_id,
                advice: report.advice,
                market_snapshot: report.market_snapshot,
                portfolio_snapshot: report.portfolio_snapshot,
                created_at: Utc::now(),
            })
        });
        store
            .expect_increment_reports_generated()
            .times(1)
            .returning(|_| {
                Ok(UsageCounters {
                    reports_generated: 1,
                    questions_asked: 0,
                })
            });
        store
    }

    #[tokio::test]
    async fn rejects_missing_or_empty_portfolio() {
        let mut fetcher = MockQuoteFetcherPort::new();
        fetcher.expect_fetch().never();
        let mut store = MockReportStorePort::new();
        store.expect_store_report().never();
        store.expect_increment_reports_generated().never();

        let service = AdviceService::new(
            cache_with(fetcher),
            Arc::new(MockAdviceGeneratorPort::new()),
            Arc::new(store),
        );

        let missing = service.generate_report(&ctx(), None, None).await;
        let empty = service
            .generate_report(&ctx(), Some(PortfolioSnapshot::default()), None)
            .await;

        assert!(matches!(
            missing,
            Err(AdviceServiceError::Validation(ValidationError::MissingPortfolio))
        ));
        assert!(matches!(
            empty,
            Err(AdviceServiceError::Validation(ValidationError::MissingPortfolio))
        ));
    }

    #[tokio::test]
    async fn stores_report_with_market_snapshot_and_context() {
        let mut fetcher = MockQuoteFetcherPort::new();
        fetcher.expect_fetch().times(1).returning(|symbols| {
            Ok(symbols
                .iter()
                .map(|s| Quote {
                    symbol: s.as_str().to_string(),
                    display_name: None,
                    price: Some(100.0),
                    change_percent: Some(1.5),
                    exchange: None,
                    currency: Some("INR".to_string()),
                })
                .collect())
        });

        let mut generator = MockAdviceGeneratorPort::new();
        generator
            .expect_generate()
            .with(always(), always(), always())
            .returning(|_, _, market| Ok(format!("{} quotes", market.len())));

        let service = AdviceService::new(cache_with(fetcher), Arc::new(generator), Arc::new(echo_store()));

        let report = service
            .generate_report(
                &ctx(),
                Some(portfolio(&["TCS.NS", "INFY.NS"])),
                Some(PortfolioId::Number(3)),
            )
            .await
            .unwrap();

        assert_eq!(report.user_id, UserId(42));
        assert_eq!(report.portfolio_id, Some(PortfolioId::Number(3)));
        assert_eq!(report.advice, "2 quotes");
        assert!(report.market_snapshot.contains_key("TCS.NS"));
        assert!(report.market_snapshot.contains_key("INFY.NS"));
    }

    #[tokio::test]
    async fn upstream_and_generator_failures_still_store_report() {
        let mut fetcher = MockQuoteFetcherPort::new();
        fetcher
            .expect_fetch()
            .returning(|_| Err(UpstreamError::Transport("reset".to_string())));

        let mut generator = MockAdviceGeneratorPort::new();
        generator
            .expect_generate()
            .returning(|_, _, _| Err(AdviceError("model offline".to_string())));

        let service = AdviceService::new(cache_with(fetcher), Arc::new(generator), Arc::new(echo_store()));

        let report = service
            .generate_report(&ctx(), Some(portfolio(&["AAA"])), None)
            .await
            .unwrap();

        assert_eq!(report.advice, FALLBACK_ADVICE);
        assert!(report.market_snapshot.is_empty());
    }

    #[tokio::test]
    async fn storage_failure_is_surfaced() {
        let mut fetcher = MockQuoteFetcherPort::new();
        fetcher.expect_fetch().returning(|_| Ok(vec![]));

        let mut generator = MockAdviceGeneratorPort::new();
        generator
            .expect_generate()
            .returning(|_, _, _| Ok("ok".to_string()));

        let mut store = MockReportStorePort::new();
        store
            .expect_store_report()
            .returning(|_, _| Err(StorageError::Unavailable("down".to_string())));
        store.expect_increment_reports_generated().never();

        let service = AdviceService::new(cache_with(fetcher), Arc::new(generator), Arc::new(store));

        let result = service
            .generate_report(&ctx(), Some(portfolio(&["AAA"])), None)
            .await;

        assert!(matches!(result, Err(AdviceServiceError::Storage(_))));
    }

    #[tokio::test]
    async fn usage_failure_does_not_fail_report() {
        let mut fetcher = MockQuoteFetcherPort::new();
        fetcher.expect_fetch().returning(|_| Ok(vec![]));

        let mut generator = MockAdviceGeneratorPort::new();
        generator
            .expect_generate()
            .returning(|_, _, _| Ok("ok".to_string()));

        let mut store = MockReportStorePort::new();
        store.expect_store_report().returning(|ctx, report| {
            Ok(StoredReport {
                id: Uuid::new_v4(),
                user_id: ctx.user_id,
                portfolio_id: report.portfolio_id,
                advice: report.advice,
                market_snapshot: report.market_snapshot,
                portfolio_snapshot: report.portfolio_snapshot,
                created_at: Utc::now(),
            })
        });
        store
            .expect_increment_reports_generated()
            .withf(|ctx| ctx.user_id == UserId(42))
            .times(1)
            .returning(|_| Err(StorageError::Rejected("counter locked".to_string())));

        let service = AdviceService::new(cache_with(fetcher), Arc::new(generator), Arc::new(store));

        let report = service
            .generate_report(&ctx(), Some(portfolio(&["AAA"])), None)
            .await
            .unwrap();

        assert_eq!(report.advice, "ok");
    }

    #[tokio::test]
    async fn usage_is_read_for_caller() {
        let mut store = MockReportStorePort::new();
        store
            .expect_usage()
            .withf(|ctx| ctx.user_id == UserId(42))
            .returning(|_| {
                Ok(UsageCounters {
                    reports_generated: 4,
                    questions_asked: 1,
                })
            });

        let service = AdviceService::new(
            cache_with(MockQuoteFetcherPort::new()),
            Arc::new(MockAdviceGeneratorPort::new()),
            Arc::new(store),
        );

        let usage = service.usage(&ctx()).await.unwrap();
        assert_eq!(usage.reports_generated, 4);
    }
}
