use async_trait::async_trait;

use crate::domain::TokenUsage;

#[derive(Debug, Clone)]
pub struct EnhancedChunk {
    pub text: String,
    pub usage: TokenUsage,
}

/// Second-pass model that adds speaker and timing structure to a raw
/// transcript chunk.
#[async_trait]
pub trait TranscriptEnhancer: Send + Sync {
    async fn enhance(
        &self,
        chunk: &str,
        chunk_index: usize,
        total_chunks: usize,
    ) -> Result<EnhancedChunk, EnhancementError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EnhancementError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}
