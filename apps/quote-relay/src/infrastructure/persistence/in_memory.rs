//! In-memory report store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::application::ports::{ReportStorePort, StorageError};
use crate::domain::advice::{NewReport, RequestContext, StoredReport, UsageCounters, UserId};

/// In-memory implementation of `ReportStorePort`.
///
/// Reports and usage counters live for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryReportStore {
    reports: RwLock<HashMap<UserId, Vec<StoredReport>>>,
    usage: RwLock<HashMap<UserId, UsageCounters>>,
}

impl InMemoryReportStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored reports across all users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.read().values().map(Vec::len).sum()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReportStorePort for InMemoryReportStore {
    async fn store_report(
        &self,
        ctx: &RequestContext,
        report: NewReport,
    ) -> Result<StoredReport, StorageError> {
        let stored = StoredReport {
            id: Uuid::new_v4(),
            user_id: ctx.user_id,
            portfolio_id: report.portfolio_id,
            advice: report.advice,
            market_snapshot: report.market_snapshot,
            portfolio_snapshot: report.portfolio_snapshot,
            created_at: Utc::now(),
        };

        self.reports
            .write()
            .entry(ctx.user_id)
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    async fn list_reports(&self, ctx: &RequestContext) -> Result<Vec<StoredReport>, StorageError> {
        let reports = self.reports.read();
        Ok(reports
            .get(&ctx.user_id)
            .map(|list| list.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn increment_reports_generated(
        &self,
        ctx: &RequestContext,
    ) -> Result<UsageCounters, StorageError> {
        let mut usage = self.usage.write();
        let counters = usage.entry(ctx.user_id).or_default();
        counters.reports_generated += 1;
        Ok(*counters)
    }

    async fn usage(&self, ctx: &RequestContext) -> Result<UsageCounters, StorageError> {
        Ok(self
            .usage
            .read()
            .get(&ctx.user_id)
            .copied()
            .unwrap_or_default())
    }
}
