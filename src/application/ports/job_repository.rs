use async_trait::async_trait;
use chrono::Duration;

use crate::domain::{Job, JobId, JobType};

use super::RepositoryError;

/// Outcome of one stale-job sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    pub requeued: u64,
    pub abandoned: u64,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &Job) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// Atomically transitions QUEUED -> PROCESSING and increments the attempt
    /// counter. Returns false when the job was not QUEUED anymore, i.e. some
    /// other worker owns it. The affected-row count is the ownership proof.
    async fn claim(&self, id: JobId) -> Result<bool, RepositoryError>;

    /// PROCESSING -> COMPLETED with the result payload. Any other prior
    /// status is a `StateConflict`.
    async fn complete(&self, id: JobId, result: &serde_json::Value)
    -> Result<(), RepositoryError>;

    /// PROCESSING -> FAILED, or QUEUED -> FAILED for early failures. Any
    /// other prior status is a `StateConflict`.
    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), RepositoryError>;

    /// QUEUED jobs of the given type, oldest first, capped at `limit`.
    async fn list_pending(&self, job_type: JobType, limit: i64)
    -> Result<Vec<Job>, RepositoryError>;

    /// Re-queues PROCESSING jobs untouched for longer than `stuck_after`,
    /// unless their attempt count reached `max_attempts`, in which case they
    /// are failed permanently.
    async fn requeue_stale(
        &self,
        stuck_after: Duration,
        max_attempts: i32,
    ) -> Result<SweepOutcome, RepositoryError>;
}
