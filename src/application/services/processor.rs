use async_trait::async_trait;

use crate::application::ports::{
    EnhancementError, FileStoreError, SynthesisError, TranscriptionError,
};
use crate::application::services::usage_recorder::UsageError;
use crate::domain::{Job, JobType};

/// One handler per job type. The scheduler has already claimed the job when
/// `process` runs; the returned payload becomes the job's result, and any
/// error fails the job with the error's message.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn process(&self, job: &Job) -> Result<serde_json::Value, ProcessorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("file access: {0}")]
    File(#[from] FileStoreError),
    #[error("transcription: {0}")]
    Transcription(#[from] TranscriptionError),
    #[error("synthesis: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("enhancement: {0}")]
    Enhancement(#[from] EnhancementError),
    #[error("usage reconciliation: {0}")]
    Usage(#[from] UsageError),
}
