use async_trait::async_trait;
use chrono::Duration;

use crate::domain::{AuditId, EndpointId, UsageId, UsageMetrics, UsageRecord, UserId};

use super::RepositoryError;

#[async_trait]
pub trait UsageRepository: Send + Sync {
    async fn insert(&self, record: &UsageRecord) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: UsageId) -> Result<Option<UsageRecord>, RepositoryError>;

    /// Fills a provisional row in place with measured values.
    async fn update_metrics(
        &self,
        id: UsageId,
        model_used: &str,
        metrics: &UsageMetrics,
    ) -> Result<(), RepositoryError>;

    /// Most recent record for (user, endpoint) within the trailing window.
    /// Heuristic fallback for jobs that did not carry an explicit usage id.
    async fn latest_within(
        &self,
        user_id: UserId,
        endpoint_id: EndpointId,
        window: Duration,
    ) -> Result<Option<UsageRecord>, RepositoryError>;

    /// Deletes `original` and inserts `first` and `second` in one unit of
    /// work, re-pointing the originating audit entry's primary usage
    /// reference to `first`.
    async fn replace_with_split(
        &self,
        original: UsageId,
        first: &UsageRecord,
        second: &UsageRecord,
    ) -> Result<(), RepositoryError>;

    async fn list_by_audit(&self, api_log_id: AuditId)
    -> Result<Vec<UsageRecord>, RepositoryError>;

    /// Opens the admission-time audit entry a billable request hangs off.
    async fn open_audit(
        &self,
        user_id: UserId,
        endpoint_id: EndpointId,
    ) -> Result<AuditId, RepositoryError>;

    async fn set_primary_usage(
        &self,
        api_log_id: AuditId,
        usage_id: UsageId,
    ) -> Result<(), RepositoryError>;
}
