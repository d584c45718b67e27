use async_trait::async_trait;

/// Recognition result as reported by the provider. The duration comes from
/// the provider's own measurement of the audio, not wall-clock time, so unit
/// cost attribution stays accurate.
#[derive(Debug, Clone)]
pub struct Transcription {
    pub phrases: Vec<String>,
    pub duration_milliseconds: u64,
}

impl Transcription {
    pub fn seconds(&self) -> f64 {
        self.duration_milliseconds as f64 / 1000.0
    }

    /// The primary combined phrase; empty when the provider returned none.
    pub fn primary_text(&self) -> &str {
        self.phrases.first().map(String::as_str).unwrap_or_default()
    }

    pub fn joined_text(&self) -> String {
        self.phrases.join(" ")
    }
}

#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    async fn transcribe(
        &self,
        audio_data: &[u8],
        filename: &str,
    ) -> Result<Transcription, TranscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
}
