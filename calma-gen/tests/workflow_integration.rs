//! End-to-end workflow tests over the public crate API
//!
//! Exercises one full generation run with mocked external services and
//! verifies the durable record, the silence-padding layout of the voice
//! track, and credit accounting.

use async_trait::async_trait;
use calma_common::Result;
use calma_gen::config::Settings;
use calma_gen::db;
use calma_gen::media::MediaAdapter;
use calma_gen::models::{Language, MeditationConfig, MeditationStatus};
use calma_gen::services::storage::ObjectStore;
use calma_gen::services::text_client::TextGenerator;
use calma_gen::services::tts_client::{SpeechSynthesizer, VoiceSettings};
use calma_gen::workflow::run_generation;
use calma_gen::AppState;
use serde_json::json;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Text model that answers the script prompt with a fixed four-section
/// script and the title prompt with fixed metadata.
struct ScriptedText;

#[async_trait]
impl TextGenerator for ScriptedText {
    async fn generate_json(
        &self,
        model: &str,
        _prompt: &str,
        _temperature: f32,
    ) -> Result<serde_json::Value> {
        if model == "title-model" {
            return Ok(json!({"title": "Slow Tide", "description": "Drift toward rest."}));
        }
        Ok(json!({
            "sections": [
                {"type": "intro", "techniqueName": "Sequential Zone Mapping",
                 "content": ["intro-one.", "intro-two."]},
                {"type": "breathing", "techniqueName": "Sequential Zone Mapping",
                 "content": ["breathing-one."]},
                {"type": "technique", "techniqueName": "Sequential Zone Mapping",
                 "content": ["technique-one.", "technique-two."]},
                {"type": "outro", "techniqueName": "Sequential Zone Mapping",
                 "content": ["outro-one."]}
            ],
            "techniques": ["Sequential Zone Mapping"],
            "purposeAlignment": "aligned"
        }))
    }
}

/// Synthesizer whose "audio" is the phrase text wrapped in markers
struct EchoSpeech;

#[async_trait]
impl SpeechSynthesizer for EchoSpeech {
    async fn synthesize(
        &self,
        _voice_id: &str,
        _settings: &VoiceSettings,
        text: &str,
    ) -> Result<Vec<u8>> {
        Ok(format!("[{}]", text).into_bytes())
    }
}

/// Store whose downloads echo the asset path in angle brackets, so the
/// assembled "audio" records which silence assets were used and where.
struct MarkerStore;

#[async_trait]
impl ObjectStore for MarkerStore {
    async fn upload(&self, _: &str, _: &str, _: &[u8], _: &str) -> Result<()> {
        Ok(())
    }
    async fn download(&self, _: &str, path: &str) -> Result<Vec<u8>> {
        Ok(format!("<{}>", path).into_bytes())
    }
    async fn signed_url(&self, _: &str, path: &str, _: u32) -> Result<String> {
        Ok(format!("https://storage.test/{}", path))
    }
    async fn head_status(&self, _: &str) -> Result<u16> {
        Ok(200)
    }
    async fn list(&self, _: &str, _: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    async fn delete(&self, _: &str, _: &[String]) -> Result<()> {
        Ok(())
    }
}

/// Media adapter that concatenates verbatim and captures the voice track
/// handed to the mixdown.
struct RecordingMedia {
    mixed_voice: Mutex<Option<Vec<u8>>>,
    mixed_duration: Mutex<Option<f64>>,
}

#[async_trait]
impl MediaAdapter for RecordingMedia {
    async fn trim(&self, input: &[u8], _: f64, _: &str) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }
    async fn concat(&self, buffers: Vec<Vec<u8>>, _: &str) -> Result<Vec<u8>> {
        Ok(buffers.concat())
    }
    async fn fade_out(&self, input: &[u8], _: f64, _: f64, _: &str) -> Result<Vec<u8>> {
        Ok(input.to_vec())
    }
    async fn measure_duration(&self, _: &[u8]) -> Result<f64> {
        Ok(321.5)
    }
    async fn mix_to_storage(
        &self,
        _background: &[u8],
        voice: &[u8],
        duration: f64,
        _prefix: &str,
        user_id: &str,
    ) -> Result<String> {
        *self.mixed_voice.lock().unwrap() = Some(voice.to_vec());
        *self.mixed_duration.lock().unwrap() = Some(duration);
        Ok(format!("{}/meditation-final.m4a", user_id))
    }
}

fn settings() -> Settings {
    Settings {
        database_path: PathBuf::from(":memory:"),
        text_api_key: "test-key".to_string(),
        text_api_base_url: "https://text.test".to_string(),
        script_model: "script-model".to_string(),
        title_model: "title-model".to_string(),
        speech_api_key: "test-key".to_string(),
        speech_api_base_url: "https://speech.test".to_string(),
        speech_model_id: "model".to_string(),
        storage_base_url: "https://storage.test".to_string(),
        storage_service_key: "test-key".to_string(),
        assets_bucket: "meditation-assets".to_string(),
        temp_bucket: "temp-files".to_string(),
        output_bucket: "meditation-output".to_string(),
        media_binary_path: PathBuf::from("ffmpeg"),
    }
}

async fn test_state(media: Arc<RecordingMedia>) -> AppState {
    AppState {
        pool: db::init_memory_pool().await.expect("in-memory pool"),
        settings: settings(),
        text: Arc::new(ScriptedText),
        speech: Arc::new(EchoSpeech),
        store: Arc::new(MarkerStore),
        media,
    }
}

fn config() -> MeditationConfig {
    MeditationConfig {
        purpose: "loosen the day's tension".to_string(),
        duration: 5,
        beginner: true,
        language: Language::En,
        voice_id: None,
        bg_track: Some("gentle".to_string()),
        user_id: "user-42".to_string(),
    }
}

#[tokio::test]
async fn full_run_produces_expected_voice_layout() {
    let media = Arc::new(RecordingMedia {
        mixed_voice: Mutex::new(None),
        mixed_duration: Mutex::new(None),
    });
    let state = test_state(media.clone()).await;

    let result = run_generation(&state, config()).await;
    assert!(result.success, "run failed: {:?}", result.error);
    assert_eq!(
        result.audio_path.as_deref(),
        Some("user-42/meditation-final.m4a")
    );

    let voice = media.mixed_voice.lock().unwrap().clone().unwrap();
    let track = String::from_utf8(voice).unwrap();

    // Leading silence, then each section with its gaps:
    //   intro      4s between phrases, 10s after (interior section)
    //   breathing  20s after (breathing always gets the long pause)
    //   technique  4s between phrases, 10s after
    //   outro      20s after (final section)
    assert_eq!(
        track,
        "<silence_3seconds.mp3>\
         [intro-one.]<silence_4seconds.mp3>[intro-two.]<silence_10seconds.mp3>\
         [breathing-one.]<silence_20seconds.mp3>\
         [technique-one.]<silence_4seconds.mp3>[technique-two.]<silence_10seconds.mp3>\
         [outro-one.]<silence_20seconds.mp3>"
    );

    // The measured voice duration flows through to the mixdown
    assert_eq!(*media.mixed_duration.lock().unwrap(), Some(321.5));
}

#[tokio::test]
async fn completed_record_is_durable_and_charged() {
    let media = Arc::new(RecordingMedia {
        mixed_voice: Mutex::new(None),
        mixed_duration: Mutex::new(None),
    });
    let state = test_state(media).await;

    let result = run_generation(&state, config()).await;
    assert!(result.success);

    let id: String = sqlx::query_scalar("SELECT id FROM meditations")
        .fetch_one(&state.pool)
        .await
        .unwrap();
    let record = calma_gen::db::meditations::load(&state.pool, id.parse().unwrap())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.status, MeditationStatus::Completed);
    assert_eq!(
        record.storage_path.as_deref(),
        Some("user-42/meditation-final.m4a")
    );
    assert_eq!(record.technique.as_deref(), Some("Sequential Zone Mapping"));
    assert_eq!(record.duration_seconds, 300);
    assert!(record.script.is_some());

    // 5 minutes at default multipliers
    let used = calma_gen::db::profiles::credits_used(&state.pool, "user-42")
        .await
        .unwrap();
    assert_eq!(used, 5);

    // No active job remains for the user
    assert!(
        !calma_gen::db::meditations::has_active_for_user(&state.pool, "user-42")
            .await
            .unwrap()
    );
}
