use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{SpeechSynthesizer, SynthesisError};
use crate::domain::AudioFormat;

/// Azure Speech synthesis client. Sends SSML, receives raw audio in the
/// requested container format.
pub struct AzureTtsEngine {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: String,
    timeout: Duration,
}

impl AzureTtsEngine {
    pub fn new(base_url: &str, api_key: &str, language: &str) -> Self {
        let endpoint = format!(
            "{}/cognitiveservices/v1",
            base_url.trim_end_matches('/')
        );
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            language: language.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn output_format(format: AudioFormat) -> &'static str {
    match format {
        AudioFormat::Wav => "riff-16khz-16bit-mono-pcm",
        AudioFormat::Mp3 => "audio-16khz-128kbitrate-mono-mp3",
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[async_trait]
impl SpeechSynthesizer for AzureTtsEngine {
    async fn synthesize(
        &self,
        text: &str,
        voice: &str,
        format: AudioFormat,
    ) -> Result<Vec<u8>, SynthesisError> {
        let ssml = format!(
            "<speak version='1.0' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
            self.language,
            voice,
            escape_xml(text)
        );

        tracing::debug!(
            endpoint = %self.endpoint,
            voice = %voice,
            format = %format,
            chars = text.len(),
            "Sending SSML to Azure Speech synthesis"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", output_format(format))
            .body(ssml)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SynthesisError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(SynthesisError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| SynthesisError::ApiRequestFailed(format!("read body: {}", e)))?;

        if audio.is_empty() {
            return Err(SynthesisError::EmptyAudio);
        }

        tracing::info!(bytes = audio.len(), "Azure Speech synthesis completed");
        Ok(audio.to_vec())
    }
}
