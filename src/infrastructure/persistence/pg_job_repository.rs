use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use crate::application::ports::{JobRepository, RepositoryError, SweepOutcome};
use crate::domain::{Job, JobId, JobStatus, JobType, UserId};

const ABANDONED_MESSAGE: &str = "abandoned after repeated processing attempts";

pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn job_from_row(row: &PgRow) -> Result<Job, RepositoryError> {
    let status: String = row
        .try_get("status")
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
    let job_type: String = row
        .try_get("job_type")
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

    Ok(Job {
        id: JobId::from_uuid(
            row.try_get("id")
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
        ),
        job_type: job_type
            .parse::<JobType>()
            .map_err(RepositoryError::QueryFailed)?,
        user_id: UserId::from_uuid(
            row.try_get("user_id")
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
        ),
        parameters: row
            .try_get("parameters")
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
        status: status
            .parse::<JobStatus>()
            .map_err(RepositoryError::QueryFailed)?,
        attempts: row
            .try_get("attempts")
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
        result: row
            .try_get("result")
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
        error_message: row
            .try_get("error_message")
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
        updated_at: row
            .try_get("updated_at")
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?,
    })
}

const JOB_COLUMNS: &str =
    "id, job_type, user_id, parameters, status, attempts, result, error_message, created_at, updated_at";

#[async_trait]
impl JobRepository for PgJobRepository {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn create(&self, job: &Job) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, user_id, parameters, status, attempts, result, error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.job_type.as_str())
        .bind(job.user_id.as_uuid())
        .bind(&job.parameters)
        .bind(job.status.as_str())
        .bind(job.attempts)
        .bind(&job.result)
        .bind(&job.error_message)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn get_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        row.as_ref().map(job_from_row).transpose()
    }

    #[instrument(skip(self), fields(job_id = %id))]
    async fn claim(&self, id: JobId) -> Result<bool, RepositoryError> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, attempts = attempts + 1, updated_at = $3
            WHERE id = $1 AND status = $4
            "#,
        )
        .bind(id.as_uuid())
        .bind(JobStatus::Processing.as_str())
        .bind(Utc::now())
        .bind(JobStatus::Queued.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(outcome.rows_affected() == 1)
    }

    #[instrument(skip(self, result), fields(job_id = %id))]
    async fn complete(
        &self,
        id: JobId,
        result: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, result = $3, error_message = NULL, updated_at = $4
            WHERE id = $1 AND status = $5
            "#,
        )
        .bind(id.as_uuid())
        .bind(JobStatus::Completed.as_str())
        .bind(result)
        .bind(Utc::now())
        .bind(JobStatus::Processing.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::StateConflict(format!(
                "job {} was not in {} when completing",
                id,
                JobStatus::Processing
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, error_message), fields(job_id = %id))]
    async fn fail(&self, id: JobId, error_message: &str) -> Result<(), RepositoryError> {
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $2, error_message = $3, updated_at = $4
            WHERE id = $1 AND status IN ($5, $6)
            "#,
        )
        .bind(id.as_uuid())
        .bind(JobStatus::Failed.as_str())
        .bind(error_message)
        .bind(Utc::now())
        .bind(JobStatus::Processing.as_str())
        .bind(JobStatus::Queued.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::StateConflict(format!(
                "job {} was already terminal when failing",
                id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(job_type = %job_type))]
    async fn list_pending(
        &self,
        job_type: JobType,
        limit: i64,
    ) -> Result<Vec<Job>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM jobs
            WHERE status = $1 AND job_type = $2
            ORDER BY created_at ASC
            LIMIT $3
            "#,
            JOB_COLUMNS
        ))
        .bind(JobStatus::Queued.as_str())
        .bind(job_type.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        rows.iter().map(job_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn requeue_stale(
        &self,
        stuck_after: Duration,
        max_attempts: i32,
    ) -> Result<SweepOutcome, RepositoryError> {
        let cutoff = Utc::now() - stuck_after;
        let now = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        let abandoned = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, error_message = $2, updated_at = $3
            WHERE status = $4 AND updated_at < $5 AND attempts >= $6
            "#,
        )
        .bind(JobStatus::Failed.as_str())
        .bind(ABANDONED_MESSAGE)
        .bind(now)
        .bind(JobStatus::Processing.as_str())
        .bind(cutoff)
        .bind(max_attempts)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?
        .rows_affected();

        let requeued = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, updated_at = $2
            WHERE status = $3 AND updated_at < $4 AND attempts < $5
            "#,
        )
        .bind(JobStatus::Queued.as_str())
        .bind(now)
        .bind(JobStatus::Processing.as_str())
        .bind(cutoff)
        .bind(max_attempts)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?
        .rows_affected();

        tx.commit()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(SweepOutcome {
            requeued,
            abandoned,
        })
    }
}
