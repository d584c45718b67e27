use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{FileStore, TranscriptionEngine};
use crate::application::services::processor::{JobProcessor, ProcessorError};
use crate::application::services::usage_recorder::{RECOGNIZER_MODEL_TAG, UsageRecorder};
use crate::domain::{Job, JobType, TranscriptionJobParameters, UsageMetrics};

/// Plain speech-to-text: one recognizer call, duration taken from the
/// provider's own report.
pub struct SttProcessor {
    file_store: Arc<dyn FileStore>,
    engine: Arc<dyn TranscriptionEngine>,
    recorder: Arc<UsageRecorder>,
}

impl SttProcessor {
    pub fn new(
        file_store: Arc<dyn FileStore>,
        engine: Arc<dyn TranscriptionEngine>,
        recorder: Arc<UsageRecorder>,
    ) -> Self {
        Self {
            file_store,
            engine,
            recorder,
        }
    }
}

#[async_trait]
impl JobProcessor for SttProcessor {
    fn job_type(&self) -> JobType {
        JobType::Stt
    }

    async fn process(&self, job: &Job) -> Result<serde_json::Value, ProcessorError> {
        let params: TranscriptionJobParameters = serde_json::from_value(job.parameters.clone())
            .map_err(|e| ProcessorError::InvalidParameters(e.to_string()))?;

        let file = self.file_store.fetch(&params.file_id, job.user_id).await?;
        tracing::debug!(file_id = %params.file_id, bytes = file.data.len(), "Source audio fetched");

        let transcription = self.engine.transcribe(&file.data, &file.name).await?;
        let seconds = transcription.seconds();
        let transcript = transcription.primary_text().to_string();

        let result = serde_json::json!({
            "message": "Transcription completed",
            "transcript": transcript,
            "seconds_processed": seconds,
        });

        self.recorder
            .reconcile(
                job.user_id,
                JobType::Stt,
                RECOGNIZER_MODEL_TAG,
                UsageMetrics::audio_seconds(seconds),
                params.usage_id,
            )
            .await?;

        // The deliverable already succeeded; a cleanup failure only warns.
        if let Err(e) = self.file_store.delete(&params.file_id, job.user_id).await {
            tracing::warn!(
                error = %e,
                file_id = %params.file_id,
                "Failed to delete source audio after transcription"
            );
        }

        Ok(result)
    }
}
