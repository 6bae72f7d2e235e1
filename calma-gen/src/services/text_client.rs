//! Text-completion client (OpenAI-compatible chat completions)
//!
//! The behavioral contract: given a prompt and a target schema, either a
//! schema-conforming value comes back or the caller gets a validation
//! error carrying the raw text for diagnosis.

use async_trait::async_trait;
use calma_common::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Seam for structured text generation. The production implementation
/// talks to an OpenAI-compatible endpoint; tests substitute canned output.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a JSON object for the prompt. The returned value has been
    /// parsed but not yet validated against the caller's schema.
    async fn generate_json(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<serde_json::Value>;
}

/// OpenAI-compatible chat-completions client
#[derive(Debug)]
pub struct OpenAiClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiClient {
    /// Construct the client. The API key is validated here so a missing
    /// credential fails at startup rather than on the first call.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(
                "Text-completion API key is empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate_json(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": temperature,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Text API error");
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Validation {
                message: "Text API returned no choices".to_string(),
                raw_text: None,
                cause: None,
            })?;

        serde_json::from_str(&content).map_err(|e| Error::Validation {
            message: "Text API returned non-JSON content".to_string(),
            raw_text: Some(content),
            cause: Some(e.to_string()),
        })
    }
}

/// Deserialize a generated JSON value into the caller's schema type,
/// attaching the raw payload to the error on mismatch.
pub fn into_schema<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
    let raw = value.to_string();
    serde_json::from_value(value).map_err(|e| Error::Validation {
        message: "Generated object does not conform to the expected schema".to_string(),
        raw_text: Some(raw),
        cause: Some(e.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct TitlePayload {
        title: String,
        description: String,
    }

    #[test]
    fn empty_api_key_is_config_error() {
        let err = OpenAiClient::new("https://api.openai.com/v1", "  ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn schema_conversion_accepts_valid_payload() {
        let value = json!({ "title": "Quiet Reset", "description": "A short rest." });
        let payload: TitlePayload = into_schema(value).unwrap();
        assert_eq!(payload.title, "Quiet Reset");
        assert_eq!(payload.description, "A short rest.");
    }

    #[test]
    fn schema_conversion_attaches_raw_text_on_mismatch() {
        let value = json!({ "title": 42 });
        let err = into_schema::<TitlePayload>(value).unwrap_err();
        match err {
            Error::Validation {
                raw_text, cause, ..
            } => {
                assert!(raw_text.unwrap().contains("42"));
                assert!(cause.is_some());
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }
}
