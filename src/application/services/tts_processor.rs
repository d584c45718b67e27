use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{FileStore, SpeechSynthesizer};
use crate::application::services::audio_duration;
use crate::application::services::processor::{JobProcessor, ProcessorError};
use crate::application::services::token_counter::count_tokens;
use crate::application::services::usage_recorder::{SYNTHESIZER_MODEL_TAG, UsageRecorder};
use crate::domain::{Job, JobType, SynthesisJobParameters, UsageMetrics};

/// Text-to-speech: synthesizes audio, measures the true duration out of the
/// container, stores the result as a new file.
pub struct TtsProcessor {
    file_store: Arc<dyn FileStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recorder: Arc<UsageRecorder>,
    default_voice: String,
}

impl TtsProcessor {
    pub fn new(
        file_store: Arc<dyn FileStore>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recorder: Arc<UsageRecorder>,
        default_voice: impl Into<String>,
    ) -> Self {
        Self {
            file_store,
            synthesizer,
            recorder,
            default_voice: default_voice.into(),
        }
    }
}

#[async_trait]
impl JobProcessor for TtsProcessor {
    fn job_type(&self) -> JobType {
        JobType::Tts
    }

    async fn process(&self, job: &Job) -> Result<serde_json::Value, ProcessorError> {
        let params: SynthesisJobParameters = serde_json::from_value(job.parameters.clone())
            .map_err(|e| ProcessorError::InvalidParameters(e.to_string()))?;

        if params.text.trim().is_empty() {
            return Err(ProcessorError::InvalidParameters(
                "text must not be empty".to_string(),
            ));
        }

        let voice = params.voice.as_deref().unwrap_or(&self.default_voice);
        let audio = self
            .synthesizer
            .synthesize(&params.text, voice, params.format)
            .await?;

        let seconds = match audio_duration::container_duration_seconds(&audio, params.format) {
            Some(seconds) => seconds,
            None => {
                let estimate =
                    audio_duration::estimate_seconds_from_size(audio.len(), params.format);
                tracing::warn!(
                    format = %params.format,
                    bytes = audio.len(),
                    estimate_seconds = estimate,
                    "Audio container carried no duration; estimating from bitrate"
                );
                estimate
            }
        };

        let file_name = format!("speech-{}.{}", job.id, params.format.as_str());
        let file_id = self
            .file_store
            .upload(
                &file_name,
                params.format.content_type(),
                audio,
                job.user_id,
            )
            .await?;

        let prompt_tokens = count_tokens(&params.text) as i64;
        let characters = params.text.chars().count();

        let result = serde_json::json!({
            "message": "Speech synthesis completed",
            "file_id": file_id,
            "seconds_processed": seconds,
            "characters": characters,
            "prompt_tokens": prompt_tokens,
        });

        let metrics = UsageMetrics {
            audio_seconds_processed: seconds,
            prompt_tokens,
            files_uploaded: 1,
            ..UsageMetrics::default()
        };
        self.recorder
            .reconcile(
                job.user_id,
                JobType::Tts,
                SYNTHESIZER_MODEL_TAG,
                metrics,
                params.usage_id,
            )
            .await?;

        Ok(result)
    }
}
