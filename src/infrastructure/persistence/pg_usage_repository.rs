use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use crate::application::ports::{RepositoryError, UsageRepository};
use crate::domain::{AuditId, EndpointId, UsageId, UsageMetrics, UsageRecord, UserId};

pub struct PgUsageRepository {
    pool: PgPool,
}

impl PgUsageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USAGE_COLUMNS: &str = "id, user_id, endpoint_id, recorded_at, model_used, \
     audio_seconds_processed, prompt_tokens, completion_tokens, total_tokens, cached_tokens, \
     files_uploaded, pages_processed, images_generated, documents_processed, api_log_id";

fn usage_from_row(row: &PgRow) -> Result<UsageRecord, RepositoryError> {
    let map_err = |e: sqlx::Error| RepositoryError::QueryFailed(e.to_string());

    Ok(UsageRecord {
        id: UsageId::from_uuid(row.try_get("id").map_err(map_err)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(map_err)?),
        endpoint_id: EndpointId::from_uuid(row.try_get("endpoint_id").map_err(map_err)?),
        recorded_at: row.try_get("recorded_at").map_err(map_err)?,
        model_used: row.try_get("model_used").map_err(map_err)?,
        metrics: UsageMetrics {
            audio_seconds_processed: row.try_get("audio_seconds_processed").map_err(map_err)?,
            prompt_tokens: row.try_get("prompt_tokens").map_err(map_err)?,
            completion_tokens: row.try_get("completion_tokens").map_err(map_err)?,
            total_tokens: row.try_get("total_tokens").map_err(map_err)?,
            cached_tokens: row.try_get("cached_tokens").map_err(map_err)?,
            files_uploaded: row.try_get("files_uploaded").map_err(map_err)?,
            pages_processed: row.try_get("pages_processed").map_err(map_err)?,
            images_generated: row.try_get("images_generated").map_err(map_err)?,
            documents_processed: row.try_get("documents_processed").map_err(map_err)?,
        },
        api_log_id: row
            .try_get::<Option<uuid::Uuid>, _>("api_log_id")
            .map_err(map_err)?
            .map(AuditId::from_uuid),
    })
}

async fn insert_record(
    tx: &mut Transaction<'_, Postgres>,
    record: &UsageRecord,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO user_usage
            (id, user_id, endpoint_id, recorded_at, model_used,
             audio_seconds_processed, prompt_tokens, completion_tokens, total_tokens,
             cached_tokens, files_uploaded, pages_processed, images_generated,
             documents_processed, api_log_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
        "#,
    )
    .bind(record.id.as_uuid())
    .bind(record.user_id.as_uuid())
    .bind(record.endpoint_id.as_uuid())
    .bind(record.recorded_at)
    .bind(&record.model_used)
    .bind(record.metrics.audio_seconds_processed)
    .bind(record.metrics.prompt_tokens)
    .bind(record.metrics.completion_tokens)
    .bind(record.metrics.total_tokens)
    .bind(record.metrics.cached_tokens)
    .bind(record.metrics.files_uploaded)
    .bind(record.metrics.pages_processed)
    .bind(record.metrics.images_generated)
    .bind(record.metrics.documents_processed)
    .bind(record.api_log_id.map(|id| id.as_uuid()))
    .execute(&mut **tx)
    .await
    .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

    Ok(())
}

#[async_trait]
impl UsageRepository for PgUsageRepository {
    #[instrument(skip(self, record), fields(usage_id = %record.id))]
    async fn insert(&self, record: &UsageRecord) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
        insert_record(&mut tx, record).await?;
        tx.commit()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self), fields(usage_id = %id))]
    async fn get_by_id(&self, id: UsageId) -> Result<Option<UsageRecord>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM user_usage WHERE id = $1",
            USAGE_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        row.as_ref().map(usage_from_row).transpose()
    }

    #[instrument(skip(self, metrics), fields(usage_id = %id))]
    async fn update_metrics(
        &self,
        id: UsageId,
        model_used: &str,
        metrics: &UsageMetrics,
    ) -> Result<(), RepositoryError> {
        let outcome = sqlx::query(
            r#"
            UPDATE user_usage
            SET model_used = $2,
                audio_seconds_processed = $3,
                prompt_tokens = $4,
                completion_tokens = $5,
                total_tokens = $6,
                cached_tokens = $7,
                files_uploaded = $8,
                pages_processed = $9,
                images_generated = $10,
                documents_processed = $11
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(model_used)
        .bind(metrics.audio_seconds_processed)
        .bind(metrics.prompt_tokens)
        .bind(metrics.completion_tokens)
        .bind(metrics.total_tokens)
        .bind(metrics.cached_tokens)
        .bind(metrics.files_uploaded)
        .bind(metrics.pages_processed)
        .bind(metrics.images_generated)
        .bind(metrics.documents_processed)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("usage record {}", id)));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, endpoint_id = %endpoint_id))]
    async fn latest_within(
        &self,
        user_id: UserId,
        endpoint_id: EndpointId,
        window: Duration,
    ) -> Result<Option<UsageRecord>, RepositoryError> {
        let since = Utc::now() - window;

        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM user_usage
            WHERE user_id = $1 AND endpoint_id = $2 AND recorded_at >= $3
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
            USAGE_COLUMNS
        ))
        .bind(user_id.as_uuid())
        .bind(endpoint_id.as_uuid())
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        row.as_ref().map(usage_from_row).transpose()
    }

    #[instrument(skip(self, first, second), fields(original = %original))]
    async fn replace_with_split(
        &self,
        original: UsageId,
        first: &UsageRecord,
        second: &UsageRecord,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        let deleted = sqlx::query("DELETE FROM user_usage WHERE id = $1")
            .bind(original.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "usage record {}",
                original
            )));
        }

        insert_record(&mut tx, first).await?;
        insert_record(&mut tx, second).await?;

        if let Some(audit_id) = first.api_log_id {
            sqlx::query("UPDATE api_logs SET primary_usage_id = $2 WHERE id = $1")
                .bind(audit_id.as_uuid())
                .bind(first.id.as_uuid())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self), fields(api_log_id = %api_log_id))]
    async fn list_by_audit(
        &self,
        api_log_id: AuditId,
    ) -> Result<Vec<UsageRecord>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM user_usage WHERE api_log_id = $1 ORDER BY recorded_at ASC",
            USAGE_COLUMNS
        ))
        .bind(api_log_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        rows.iter().map(usage_from_row).collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id, endpoint_id = %endpoint_id))]
    async fn open_audit(
        &self,
        user_id: UserId,
        endpoint_id: EndpointId,
    ) -> Result<AuditId, RepositoryError> {
        let audit_id = AuditId::new();

        sqlx::query(
            r#"
            INSERT INTO api_logs (id, user_id, endpoint_id, requested_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(audit_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(endpoint_id.as_uuid())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        Ok(audit_id)
    }

    #[instrument(skip(self), fields(api_log_id = %api_log_id, usage_id = %usage_id))]
    async fn set_primary_usage(
        &self,
        api_log_id: AuditId,
        usage_id: UsageId,
    ) -> Result<(), RepositoryError> {
        let outcome = sqlx::query("UPDATE api_logs SET primary_usage_id = $2 WHERE id = $1")
            .bind(api_log_id.as_uuid())
            .bind(usage_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;

        if outcome.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "audit entry {}",
                api_log_id
            )));
        }
        Ok(())
    }
}
