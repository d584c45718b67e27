use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::application::ports::{Transcription, TranscriptionEngine, TranscriptionError};

/// Azure Speech fast-transcription client. The response carries the
/// provider-measured audio duration alongside the recognized phrases.
pub struct AzureSpeechEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    locale: String,
    timeout: Duration,
}

impl AzureSpeechEngine {
    pub fn new(base_url: &str, api_key: &str, api_version: &str, locale: &str) -> Self {
        let endpoint = format!(
            "{}/speechtotext/transcriptions:transcribe?api-version={}",
            base_url.trim_end_matches('/'),
            api_version,
        );
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            locale: locale.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct FastTranscriptionResponse {
    #[serde(rename = "durationMilliseconds")]
    duration_milliseconds: u64,
    #[serde(rename = "combinedPhrases", default)]
    combined_phrases: Vec<CombinedPhrase>,
}

#[derive(Deserialize)]
struct CombinedPhrase {
    text: String,
}

fn mime_for(filename: &str) -> &'static str {
    match filename.rsplit('.').next() {
        Some("mp3") => "audio/mpeg",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        _ => "audio/wav",
    }
}

#[async_trait]
impl TranscriptionEngine for AzureSpeechEngine {
    async fn transcribe(
        &self,
        audio_data: &[u8],
        filename: &str,
    ) -> Result<Transcription, TranscriptionError> {
        let file_part = multipart::Part::bytes(audio_data.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_for(filename))
            .map_err(|e| TranscriptionError::UnsupportedFormat(format!("mime: {}", e)))?;

        let definition = serde_json::json!({ "locales": [self.locale] }).to_string();
        let definition_part = multipart::Part::text(definition)
            .mime_str("application/json")
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .part("audio", file_part)
            .part("definition", definition_part);

        tracing::debug!(endpoint = %self.endpoint, bytes = audio_data.len(), "Sending audio to Azure Speech");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let result: FastTranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::MalformedResponse(e.to_string()))?;

        tracing::info!(
            duration_ms = result.duration_milliseconds,
            phrases = result.combined_phrases.len(),
            "Azure Speech transcription completed"
        );

        Ok(Transcription {
            phrases: result
                .combined_phrases
                .into_iter()
                .map(|p| p.text.trim().to_string())
                .collect(),
            duration_milliseconds: result.duration_milliseconds,
        })
    }
}
