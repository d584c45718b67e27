use std::sync::Arc;

use chrono::Duration;

use crate::application::ports::{EndpointCatalog, RepositoryError, UsageRepository};
use crate::domain::{
    EndpointId, JobType, TokenUsage, UsageId, UsageMetrics, UsageRecord, UserId,
};

/// `model_used` tag for the speech recognizer's share of an operation.
pub const RECOGNIZER_MODEL_TAG: &str = "ms_stt";
/// `model_used` tag for the enhancement model's share of an operation.
pub const ENHANCER_MODEL_TAG: &str = "llm_enhance";
/// `model_used` tag for speech synthesis.
pub const SYNTHESIZER_MODEL_TAG: &str = "ms_tts";

/// Billable path for a job type under the metered namespace.
pub fn endpoint_path(namespace: &str, job_type: JobType) -> String {
    format!("{}/{}", namespace.trim_end_matches('/'), job_type)
}

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("no endpoint registered for path {0}")]
    UnknownEndpoint(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}

/// Fills the provisional usage row created at admission with the measured
/// values, or splits it when one operation spans two cost models. The
/// explicit usage id carried in the job parameters is the primary lookup;
/// the time-window search only covers jobs admitted without one.
pub struct UsageRecorder {
    usage: Arc<dyn UsageRepository>,
    catalog: Arc<dyn EndpointCatalog>,
    namespace: String,
    lookback: Duration,
}

impl UsageRecorder {
    pub fn new(
        usage: Arc<dyn UsageRepository>,
        catalog: Arc<dyn EndpointCatalog>,
        namespace: impl Into<String>,
        lookback: Duration,
    ) -> Self {
        Self {
            usage,
            catalog,
            namespace: namespace.into(),
            lookback,
        }
    }

    /// Updates the provisional row in place; inserts a fallback row when none
    /// can be located so the measured usage is never lost.
    pub async fn reconcile(
        &self,
        user_id: UserId,
        job_type: JobType,
        model_used: &str,
        metrics: UsageMetrics,
        usage_ref: Option<UsageId>,
    ) -> Result<UsageId, UsageError> {
        let endpoint_id = self.resolve_endpoint(job_type).await?;

        match self
            .locate_provisional(user_id, endpoint_id, usage_ref)
            .await?
        {
            Some(record) => {
                self.usage
                    .update_metrics(record.id, model_used, &metrics)
                    .await?;
                tracing::debug!(
                    usage_id = %record.id,
                    model_used = %model_used,
                    "Usage reconciled"
                );
                Ok(record.id)
            }
            None => {
                tracing::warn!(
                    user_id = %user_id,
                    job_type = %job_type,
                    "No provisional usage row found; inserting fallback record"
                );
                let record =
                    UsageRecord::measured(user_id, endpoint_id, model_used, metrics, None);
                self.usage.insert(&record).await?;
                Ok(record.id)
            }
        }
    }

    /// Replaces the single provisional row with exactly two rows sharing the
    /// originating audit reference: one carrying the recognizer's audio
    /// seconds, one carrying the enhancement model's token counts.
    pub async fn reconcile_split(
        &self,
        user_id: UserId,
        job_type: JobType,
        audio_seconds: f64,
        tokens: TokenUsage,
        usage_ref: Option<UsageId>,
    ) -> Result<(UsageId, UsageId), UsageError> {
        let endpoint_id = self.resolve_endpoint(job_type).await?;

        if let Some(record) = self
            .locate_provisional(user_id, endpoint_id, usage_ref)
            .await?
        {
            let first = UsageRecord::measured(
                user_id,
                endpoint_id,
                RECOGNIZER_MODEL_TAG,
                UsageMetrics::audio_seconds(audio_seconds),
                record.api_log_id,
            );
            let second = UsageRecord::measured(
                user_id,
                endpoint_id,
                ENHANCER_MODEL_TAG,
                UsageMetrics::tokens(tokens),
                record.api_log_id,
            );
            self.usage
                .replace_with_split(record.id, &first, &second)
                .await?;
            tracing::debug!(
                replaced = %record.id,
                recognizer = %first.id,
                enhancer = %second.id,
                "Usage split across cost models"
            );
            return Ok((first.id, second.id));
        }

        tracing::warn!(
            user_id = %user_id,
            job_type = %job_type,
            "No provisional usage row found for split; inserting fallback records"
        );
        let first = UsageRecord::measured(
            user_id,
            endpoint_id,
            RECOGNIZER_MODEL_TAG,
            UsageMetrics::audio_seconds(audio_seconds),
            None,
        );
        let second = UsageRecord::measured(
            user_id,
            endpoint_id,
            ENHANCER_MODEL_TAG,
            UsageMetrics::tokens(tokens),
            None,
        );
        self.usage.insert(&first).await?;
        self.usage.insert(&second).await?;
        Ok((first.id, second.id))
    }

    async fn resolve_endpoint(&self, job_type: JobType) -> Result<EndpointId, UsageError> {
        let path = endpoint_path(&self.namespace, job_type);
        self.catalog
            .endpoint_by_path(&path)
            .await?
            .ok_or(UsageError::UnknownEndpoint(path))
    }

    async fn locate_provisional(
        &self,
        user_id: UserId,
        endpoint_id: EndpointId,
        usage_ref: Option<UsageId>,
    ) -> Result<Option<UsageRecord>, UsageError> {
        if let Some(id) = usage_ref {
            if let Some(record) = self.usage.get_by_id(id).await? {
                return Ok(Some(record));
            }
            tracing::warn!(
                usage_id = %id,
                "Provisional usage row referenced by the job is missing; falling back to window search"
            );
        }
        Ok(self
            .usage
            .latest_within(user_id, endpoint_id, self.lookback)
            .await?)
    }
}
