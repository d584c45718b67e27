use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{FileStore, TranscriptEnhancer, TranscriptionEngine};
use crate::application::services::processor::{JobProcessor, ProcessorError};
use crate::application::services::text_chunker::TextChunker;
use crate::application::services::token_counter::count_tokens;
use crate::application::services::usage_recorder::UsageRecorder;
use crate::domain::{Job, JobType, TokenUsage, TranscriptionJobParameters};

/// Speech-to-text with a second enhancement pass that adds speaker and
/// timing structure. Spans two billable models, so its usage reconciliation
/// uses the dual-split path.
pub struct SttDiarizeProcessor {
    file_store: Arc<dyn FileStore>,
    engine: Arc<dyn TranscriptionEngine>,
    enhancer: Arc<dyn TranscriptEnhancer>,
    recorder: Arc<UsageRecorder>,
    chunker: TextChunker,
    token_budget: usize,
}

impl SttDiarizeProcessor {
    pub fn new(
        file_store: Arc<dyn FileStore>,
        engine: Arc<dyn TranscriptionEngine>,
        enhancer: Arc<dyn TranscriptEnhancer>,
        recorder: Arc<UsageRecorder>,
        chunker: TextChunker,
        token_budget: usize,
    ) -> Self {
        Self {
            file_store,
            engine,
            enhancer,
            recorder,
            chunker,
            token_budget,
        }
    }

    /// Enhances the transcript whole when it fits the token budget, else per
    /// overlapping chunk. A failure on any chunk fails the whole attempt; no
    /// partial result is committed.
    async fn enhance_transcript(
        &self,
        raw: &str,
    ) -> Result<(String, TokenUsage, usize), ProcessorError> {
        let token_count = count_tokens(raw);
        if token_count <= self.token_budget {
            let enhanced = self.enhancer.enhance(raw, 0, 1).await?;
            return Ok((enhanced.text, enhanced.usage, 1));
        }

        let chunks = self.chunker.chunk(raw);
        let total = chunks.len();
        tracing::debug!(
            tokens = token_count,
            chunks = total,
            "Transcript exceeds enhancement budget; chunking"
        );

        let mut parts = Vec::with_capacity(total);
        let mut usage = TokenUsage::default();
        for (index, chunk) in chunks.iter().enumerate() {
            let enhanced = self.enhancer.enhance(&chunk.text, index, total).await?;
            usage.accumulate(&enhanced.usage);
            parts.push(enhanced.text);
        }

        Ok((parts.join("\n"), usage, total))
    }
}

#[async_trait]
impl JobProcessor for SttDiarizeProcessor {
    fn job_type(&self) -> JobType {
        JobType::SttDiarize
    }

    async fn process(&self, job: &Job) -> Result<serde_json::Value, ProcessorError> {
        let params: TranscriptionJobParameters = serde_json::from_value(job.parameters.clone())
            .map_err(|e| ProcessorError::InvalidParameters(e.to_string()))?;

        let file = self.file_store.fetch(&params.file_id, job.user_id).await?;
        let transcription = self.engine.transcribe(&file.data, &file.name).await?;
        let seconds = transcription.seconds();
        let raw = transcription.joined_text();

        let (enhanced, usage, chunk_count) = self.enhance_transcript(&raw).await?;

        let result = serde_json::json!({
            "message": "Diarized transcription completed",
            "transcript": enhanced,
            "seconds_processed": seconds,
            "prompt_tokens": usage.prompt_tokens,
            "completion_tokens": usage.completion_tokens,
            "total_tokens": usage.total_tokens,
            "chunks": chunk_count,
        });

        self.recorder
            .reconcile_split(
                job.user_id,
                JobType::SttDiarize,
                seconds,
                usage,
                params.usage_id,
            )
            .await?;

        if let Err(e) = self.file_store.delete(&params.file_id, job.user_id).await {
            tracing::warn!(
                error = %e,
                file_id = %params.file_id,
                "Failed to delete source audio after diarization"
            );
        }

        Ok(result)
    }
}
