use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::application::ports::{EnhancedChunk, EnhancementError, TranscriptEnhancer};
use crate::domain::TokenUsage;

const SYSTEM_PROMPT: &str = "You restructure raw speech transcripts. Identify the speakers, \
label each turn as 'Speaker N:', keep the wording verbatim, and preserve the original order. \
Output only the restructured transcript.";

/// Chat-completions client for the transcript enhancement pass. Works
/// against any OpenAI-compatible endpoint.
pub struct OpenAiEnhancer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiEnhancer {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: i64,
    #[serde(default)]
    completion_tokens: i64,
    #[serde(default)]
    total_tokens: i64,
    #[serde(default)]
    prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Deserialize, Default)]
struct PromptTokensDetails {
    #[serde(default)]
    cached_tokens: i64,
}

#[async_trait]
impl TranscriptEnhancer for OpenAiEnhancer {
    async fn enhance(
        &self,
        chunk: &str,
        chunk_index: usize,
        total_chunks: usize,
    ) -> Result<EnhancedChunk, EnhancementError> {
        let system = if total_chunks > 1 {
            format!(
                "{} This is part {} of {} of a longer transcript; parts overlap slightly.",
                SYSTEM_PROMPT,
                chunk_index + 1,
                total_chunks
            )
        } else {
            SYSTEM_PROMPT.to_string()
        };

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": chunk },
            ],
        });

        tracing::debug!(
            endpoint = %self.endpoint,
            chunk_index = chunk_index,
            total_chunks = total_chunks,
            chars = chunk.len(),
            "Sending transcript chunk for enhancement"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| EnhancementError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EnhancementError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| EnhancementError::MalformedResponse(e.to_string()))?;

        let text = result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                EnhancementError::MalformedResponse("response carried no choices".to_string())
            })?;

        let usage = result.usage.unwrap_or_default();
        Ok(EnhancedChunk {
            text,
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
                cached_tokens: usage
                    .prompt_tokens_details
                    .unwrap_or_default()
                    .cached_tokens,
            },
        })
    }
}
