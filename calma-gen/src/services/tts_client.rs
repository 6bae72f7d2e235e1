//! Speech-synthesis client (ElevenLabs-style)
//!
//! One request per spoken line; raw audio bytes come back synchronously.
//! A non-2xx response is a hard failure with status and body captured.

use async_trait::async_trait;
use calma_common::{Error, Result};
use serde::Serialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Synthesis tuning parameters sent with every request
#[derive(Debug, Clone, Serialize)]
pub struct VoiceSettings {
    pub stability: f64,
    pub similarity_boost: f64,
    pub style: f64,
    pub speed: f64,
    pub use_speaker_boost: bool,
}

impl VoiceSettings {
    /// House tuning for meditation narration; only speed varies per voice
    pub fn for_speed(speed: f64) -> Self {
        Self {
            stability: 0.35,
            similarity_boost: 0.85,
            style: 0.5,
            speed,
            use_speaker_boost: true,
        }
    }
}

/// Seam for phrase synthesis
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one phrase with the given voice, returning audio bytes
    async fn synthesize(
        &self,
        voice_id: &str,
        settings: &VoiceSettings,
        text: &str,
    ) -> Result<Vec<u8>>;
}

/// ElevenLabs-compatible text-to-speech client
#[derive(Debug)]
pub struct ElevenLabsClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

impl ElevenLabsClient {
    pub fn new(base_url: &str, api_key: &str, model_id: &str) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Config(
                "Speech-synthesis API key is empty".to_string(),
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
            model_id: model_id.to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(
        &self,
        voice_id: &str,
        settings: &VoiceSettings,
        text: &str,
    ) -> Result<Vec<u8>> {
        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);

        tracing::debug!(
            voice_id,
            preview = %text.chars().take(50).collect::<String>(),
            "Synthesizing phrase"
        );

        let response = self
            .http_client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&SynthesisRequest {
                text,
                model_id: &self.model_id,
                voice_settings: settings,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Speech API error");
            return Err(Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_api_key_is_config_error() {
        let err = ElevenLabsClient::new("https://api.elevenlabs.io", "", "eleven_multilingual_v2")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn voice_settings_carry_house_tuning() {
        let settings = VoiceSettings::for_speed(0.85);
        assert_eq!(settings.stability, 0.35);
        assert_eq!(settings.similarity_boost, 0.85);
        assert_eq!(settings.style, 0.5);
        assert_eq!(settings.speed, 0.85);
        assert!(settings.use_speaker_boost);
    }
}
