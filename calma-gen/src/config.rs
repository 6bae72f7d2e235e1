//! Configuration resolution for calma-gen
//!
//! Priority per setting: environment variable (`CALMA_*`) then the TOML
//! config file, then a compiled default where one makes sense. Credentials
//! have no defaults: a missing credential is a startup error so a broken
//! deployment fails before any job is accepted, not in the middle of one.

use calma_common::config::{load_toml_config, TomlConfig};
use calma_common::{Error, Result};
use std::path::PathBuf;
use tracing::info;

/// Resolved service settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_path: PathBuf,

    /// Text-completion service (OpenAI-compatible)
    pub text_api_key: String,
    pub text_api_base_url: String,
    /// Model for script generation
    pub script_model: String,
    /// Cheaper model for the title/description side task
    pub title_model: String,

    /// Speech-synthesis service
    pub speech_api_key: String,
    pub speech_api_base_url: String,
    pub speech_model_id: String,

    /// Object storage service
    pub storage_base_url: String,
    pub storage_service_key: String,
    pub assets_bucket: String,
    pub temp_bucket: String,
    pub output_bucket: String,

    /// External media-processing binary
    pub media_binary_path: PathBuf,
}

fn env_or_toml(env_name: &str, toml_value: Option<&String>) -> Option<String> {
    if let Ok(value) = std::env::var(env_name) {
        if !value.trim().is_empty() {
            return Some(value);
        }
    }
    toml_value
        .filter(|v| !v.trim().is_empty())
        .cloned()
}

fn required(env_name: &str, toml_value: Option<&String>, what: &str) -> Result<String> {
    env_or_toml(env_name, toml_value).ok_or_else(|| {
        Error::Config(format!(
            "{} not configured. Set {} or add it to the calma-gen TOML config.",
            what, env_name
        ))
    })
}

impl Settings {
    /// Load and validate settings. Fails fast on missing credentials.
    pub fn load() -> Result<Self> {
        let toml: TomlConfig = load_toml_config("calma-gen")?;
        Self::resolve(&toml)
    }

    fn resolve(toml: &TomlConfig) -> Result<Self> {
        let database_path = env_or_toml("CALMA_DATABASE_PATH", toml.database_path.as_ref())
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let text_api_key = required(
            "CALMA_TEXT_API_KEY",
            toml.text_api_key.as_ref(),
            "Text-completion API key",
        )?;
        let speech_api_key = required(
            "CALMA_SPEECH_API_KEY",
            toml.speech_api_key.as_ref(),
            "Speech-synthesis API key",
        )?;
        let storage_base_url = required(
            "CALMA_STORAGE_BASE_URL",
            toml.storage_base_url.as_ref(),
            "Object storage base URL",
        )?;
        let storage_service_key = required(
            "CALMA_STORAGE_SERVICE_KEY",
            toml.storage_service_key.as_ref(),
            "Object storage service key",
        )?;

        let settings = Self {
            database_path,
            text_api_key,
            text_api_base_url: env_or_toml(
                "CALMA_TEXT_API_BASE_URL",
                toml.text_api_base_url.as_ref(),
            )
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            script_model: std::env::var("CALMA_SCRIPT_MODEL")
                .unwrap_or_else(|_| "gpt-4.1-2025-04-14".to_string()),
            title_model: std::env::var("CALMA_TITLE_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            speech_api_key,
            speech_api_base_url: env_or_toml(
                "CALMA_SPEECH_API_BASE_URL",
                toml.speech_api_base_url.as_ref(),
            )
            .unwrap_or_else(|| "https://api.elevenlabs.io".to_string()),
            speech_model_id: std::env::var("CALMA_SPEECH_MODEL_ID")
                .unwrap_or_else(|_| "eleven_multilingual_v2".to_string()),
            storage_base_url: storage_base_url.trim_end_matches('/').to_string(),
            storage_service_key,
            assets_bucket: std::env::var("CALMA_ASSETS_BUCKET")
                .unwrap_or_else(|_| "meditation-assets".to_string()),
            temp_bucket: std::env::var("CALMA_TEMP_BUCKET")
                .unwrap_or_else(|_| "temp-files".to_string()),
            output_bucket: std::env::var("CALMA_OUTPUT_BUCKET")
                .unwrap_or_else(|_| "meditation-output".to_string()),
            media_binary_path: env_or_toml(
                "CALMA_MEDIA_BINARY",
                toml.media_binary_path.as_ref(),
            )
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffmpeg")),
        };

        info!(
            database = %settings.database_path.display(),
            text_api = %settings.text_api_base_url,
            speech_api = %settings.speech_api_base_url,
            storage = %settings.storage_base_url,
            media_binary = %settings.media_binary_path.display(),
            "Settings resolved"
        );

        Ok(settings)
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("calma")
        .join("calma.db")
}
