use std::sync::Arc;

use rust_decimal::Decimal;

use crate::application::ports::{EndpointCatalog, JobRepository, RepositoryError, UsageRepository};
use crate::application::services::balance_ledger::{BalanceLedger, LedgerError};
use crate::application::services::usage_recorder::endpoint_path;
use crate::domain::{
    Job, JobId, JobType, SynthesisJobParameters, TranscriptionJobParameters, UsageRecord, UserId,
};

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("insufficient balance: {current} available, {required} required")]
    InsufficientBalance { current: Decimal, required: Decimal },
    #[error("no endpoint registered for path {0}")]
    UnknownEndpoint(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),
}

/// The admission-time gate in front of the job queue: validates parameters,
/// charges the endpoint cost, opens the audit entry with its zeroed
/// provisional usage row, and only then creates the QUEUED job. Nothing is
/// queued when the balance check fails.
pub struct AdmissionService {
    jobs: Arc<dyn JobRepository>,
    usage: Arc<dyn UsageRepository>,
    catalog: Arc<dyn EndpointCatalog>,
    ledger: Arc<BalanceLedger>,
    namespace: String,
}

impl AdmissionService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        usage: Arc<dyn UsageRepository>,
        catalog: Arc<dyn EndpointCatalog>,
        ledger: Arc<BalanceLedger>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            jobs,
            usage,
            catalog,
            ledger,
            namespace: namespace.into(),
        }
    }

    pub async fn submit(
        &self,
        user_id: UserId,
        job_type: JobType,
        mut parameters: serde_json::Value,
    ) -> Result<JobId, AdmissionError> {
        validate_parameters(job_type, &parameters)?;

        let path = endpoint_path(&self.namespace, job_type);
        let endpoint_id = self
            .catalog
            .endpoint_by_path(&path)
            .await?
            .ok_or_else(|| AdmissionError::UnknownEndpoint(path.clone()))?;

        match self.ledger.check_and_deduct(user_id, endpoint_id, None).await {
            Ok(_) => {}
            Err(LedgerError::InsufficientBalance { current, required }) => {
                tracing::info!(
                    user_id = %user_id,
                    path = %path,
                    current = %current,
                    required = %required,
                    "Submission rejected: insufficient balance"
                );
                return Err(AdmissionError::InsufficientBalance { current, required });
            }
            Err(LedgerError::UnknownEndpoint(p)) => {
                return Err(AdmissionError::UnknownEndpoint(p));
            }
            Err(LedgerError::Repository(e)) => return Err(e.into()),
        }

        let audit_id = self.usage.open_audit(user_id, endpoint_id).await?;
        let provisional = UsageRecord::provisional(user_id, endpoint_id, audit_id);
        self.usage.insert(&provisional).await?;
        self.usage.set_primary_usage(audit_id, provisional.id).await?;

        if let serde_json::Value::Object(map) = &mut parameters {
            map.insert("usage_id".to_string(), serde_json::json!(provisional.id));
            map.insert("audit_id".to_string(), serde_json::json!(audit_id));
        }

        let job = Job::new(job_type, user_id, parameters);
        self.jobs.create(&job).await?;

        tracing::info!(
            job_id = %job.id,
            job_type = %job_type,
            user_id = %user_id,
            "Job admitted and queued"
        );
        Ok(job.id)
    }
}

fn validate_parameters(
    job_type: JobType,
    parameters: &serde_json::Value,
) -> Result<(), AdmissionError> {
    match job_type {
        JobType::Stt | JobType::SttDiarize => {
            let params: TranscriptionJobParameters =
                serde_json::from_value(parameters.clone())
                    .map_err(|e| AdmissionError::InvalidParameters(e.to_string()))?;
            if params.file_id.trim().is_empty() {
                return Err(AdmissionError::InvalidParameters(
                    "file_id must not be empty".to_string(),
                ));
            }
        }
        JobType::Tts => {
            let params: SynthesisJobParameters = serde_json::from_value(parameters.clone())
                .map_err(|e| AdmissionError::InvalidParameters(e.to_string()))?;
            if params.text.trim().is_empty() {
                return Err(AdmissionError::InvalidParameters(
                    "text must not be empty".to_string(),
                ));
            }
        }
    }
    Ok(())
}
