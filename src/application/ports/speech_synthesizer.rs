use async_trait::async_trait;

use crate::domain::AudioFormat;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: AudioFormat,
    ) -> Result<Vec<u8>, SynthesisError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("empty audio returned")]
    EmptyAudio,
}
