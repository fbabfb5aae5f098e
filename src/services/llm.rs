//! LLM provider abstraction
//!
//! Company summaries go through `LlmProvider` so the HTTP layer and tests never
//! depend on a particular vendor. `OpenAiProvider` talks to the OpenAI Responses API.
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const MAX_ATTEMPTS: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a single prompt and returns the model's text output
    async fn complete(&self, prompt: &str) -> AppResult<String>;

    /// Model identifier, used for cache keys and responses
    fn model(&self) -> String;
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    part_type: String,
    #[serde(default)]
    text: Option<String>,
}

impl ResponsesResponse {
    /// Concatenates every `output_text` part, in order
    fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.part_type == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct OpenAiProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, api_url: String, model: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            model,
        })
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    /// Retries rate limits and server errors with exponential backoff (1s, 2s)
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        if self.api_key.is_empty() {
            return Err(AppError::ExternalApi(
                "LLM API key is not configured".to_string(),
            ));
        }

        let url = format!("{}/responses", self.api_url.trim_end_matches('/'));
        let body = ResponsesRequest {
            model: &self.model,
            input: prompt,
        };

        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying LLM request"
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self
                .http_client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(AppError::HttpClient(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let text = response.text().await.unwrap_or_default();
                last_error = Some(AppError::ExternalApi(format!(
                    "LLM API returned status {}: {}",
                    status, text
                )));
                continue;
            }

            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorEnvelope>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                return Err(AppError::ExternalApi(format!(
                    "LLM API returned status {}: {}",
                    status, message
                )));
            }

            let parsed: ResponsesResponse = response.json().await?;
            let text = parsed.output_text();

            if text.trim().is_empty() {
                return Err(AppError::ExternalApi(
                    "LLM returned no text output".to_string(),
                ));
            }

            tracing::debug!(model = %self.model, chars = text.len(), "LLM call succeeded");
            return Ok(text);
        }

        Err(last_error.unwrap_or_else(|| {
            AppError::ExternalApi("LLM request failed after retries".to_string())
        }))
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_text_joins_text_parts() {
        let raw = r#"{
            "id": "resp_1",
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Hello, ", "annotations": []},
                    {"type": "refusal", "refusal": "no"},
                    {"type": "output_text", "text": "world.", "annotations": []}
                ]}
            ]
        }"#;

        let parsed: ResponsesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.output_text(), "Hello, world.");
    }

    #[test]
    fn test_output_text_empty_when_no_output() {
        let parsed: ResponsesResponse = serde_json::from_str(r#"{"id": "resp_2"}"#).unwrap();
        assert_eq!(parsed.output_text(), "");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_network() {
        let provider = OpenAiProvider::new(
            String::new(),
            "http://127.0.0.1:9".to_string(),
            "gpt-4.1-mini".to_string(),
        )
        .unwrap();

        let result = provider.complete("hello").await;
        assert!(matches!(result, Err(AppError::ExternalApi(_))));
        assert_eq!(provider.model(), "gpt-4.1-mini");
    }
}
