//! calma-gen - Meditation Session Generator
//!
//! **Module Identity:**
//! - Name: calma-gen (Session Generator)
//! - Role: durable-task worker, one generation job per invocation
//!
//! **[GEN-OV-010]** Turns a session config (purpose, duration, language,
//! voice, background track) into finished audio: script generation through
//! a text model, per-phrase speech synthesis, silence-padded assembly,
//! background mix, upload, and credit accounting over a SQLite-backed
//! state machine.

pub mod catalog;
pub mod config;
pub mod db;
pub mod media;
pub mod models;
pub mod services;
pub mod workflow;

use std::sync::Arc;

use crate::config::Settings;
use crate::media::ffmpeg::FfmpegAdapter;
use crate::media::MediaAdapter;
use crate::services::storage::{ObjectStore, StorageClient};
use crate::services::text_client::{OpenAiClient, TextGenerator};
use crate::services::tts_client::{ElevenLabsClient, SpeechSynthesizer};
use sqlx::SqlitePool;

/// Application state shared across the job run
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool **[GEN-DB-010]**
    pub pool: SqlitePool,
    pub settings: Settings,
    /// Text-completion client (script + title generation)
    pub text: Arc<dyn TextGenerator>,
    /// Speech-synthesis client
    pub speech: Arc<dyn SpeechSynthesizer>,
    /// Object storage client
    pub store: Arc<dyn ObjectStore>,
    /// Media-processing adapter
    pub media: Arc<dyn MediaAdapter>,
}

impl AppState {
    /// Build production state from settings: open the database and wire
    /// the concrete external-service clients.
    pub async fn from_settings(settings: Settings) -> calma_common::Result<Self> {
        let pool = db::init_database_pool(&settings.database_path).await?;

        let text = Arc::new(OpenAiClient::new(
            &settings.text_api_base_url,
            &settings.text_api_key,
        )?);
        let speech = Arc::new(ElevenLabsClient::new(
            &settings.speech_api_base_url,
            &settings.speech_api_key,
            &settings.speech_model_id,
        )?);
        let store: Arc<dyn ObjectStore> = Arc::new(StorageClient::new(
            &settings.storage_base_url,
            &settings.storage_service_key,
        )?);
        let media = Arc::new(FfmpegAdapter::new(
            store.clone(),
            settings.media_binary_path.clone(),
            &settings.temp_bucket,
            &settings.output_bucket,
        )?);

        Ok(Self {
            pool,
            settings,
            text,
            speech,
            store,
            media,
        })
    }
}
