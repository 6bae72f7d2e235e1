//! Job orchestration
//!
//! **[GEN-WF-020]** State machine over the meditations row:
//! `pending` → `script_generated` → `completed`, with `failed` reachable
//! from any non-terminal state. The row is the durable source of truth;
//! the returned result is informational. Credits are deducted only after
//! the `completed` update has committed, so an interrupted job never
//! charges the user.

use calma_common::{Error, Result};
use tracing::{error, info};
use uuid::Uuid;

use crate::db::{meditations, profiles, voices};
use crate::models::{MeditationConfig, MeditationRecord};
use crate::services::{AudioGenerator, ScriptGenerator, TitleDescriptionGenerator};
use crate::workflow::GenerationTaskResult;
use crate::AppState;

/// Run one generation job end to end. Never returns `Err`: any failure is
/// recorded on the row (best effort) and reported through the result
/// contract.
pub async fn run_generation(state: &AppState, config: MeditationConfig) -> GenerationTaskResult {
    let record = MeditationRecord::new(&config);

    info!(
        meditation_id = %record.id,
        user_id = %config.user_id,
        duration_minutes = config.duration,
        language = config.language.code(),
        "Inserting generation record"
    );
    if let Err(e) = meditations::insert(&state.pool, &record).await {
        error!(error = %e, "Failed to create generation record");
        return GenerationTaskResult::failed(&e);
    }

    match drive(state, &config, record.id).await {
        Ok(result) => result,
        Err(e) => {
            error!(meditation_id = %record.id, error = %e, "Generation failed");
            if let Err(update_err) =
                meditations::mark_failed(&state.pool, record.id, &e.to_string()).await
            {
                error!(error = %update_err, "Failed to record failure on generation row");
            }
            GenerationTaskResult::failed(&e)
        }
    }
}

async fn drive(
    state: &AppState,
    config: &MeditationConfig,
    meditation_id: Uuid,
) -> Result<GenerationTaskResult> {
    let script_generator = ScriptGenerator::new(state.text.clone(), &state.settings.script_model);
    let audio_generator = AudioGenerator::resolve(
        &state.pool,
        state.speech.clone(),
        state.store.clone(),
        state.media.clone(),
        config.voice_id.as_deref(),
        config.bg_track.as_deref(),
        &state.settings.assets_bucket,
        &state.settings.temp_bucket,
        &config.user_id,
    )
    .await?;

    info!("Generating session script");
    let script = script_generator.generate(config).await?;
    let technique = script
        .output
        .techniques
        .first()
        .cloned()
        .unwrap_or_else(|| script.technique_name.clone());

    meditations::mark_script_generated(&state.pool, meditation_id, &script.output, &technique)
        .await?;

    spawn_title_task(state, config, meditation_id, &technique);

    info!("Rendering session audio");
    let audio_path = audio_generator.generate_from_script(&script.output).await?;

    meditations::mark_completed(&state.pool, meditation_id, &audio_path, chrono::Utc::now())
        .await?;

    // Completion is durable from here on; billing and cleanup failures
    // must not fail the job retroactively.
    if let Err(e) = deduct_credits(state, config).await {
        error!(meditation_id = %meditation_id, error = %e, "Credit deduction failed");
    }
    audio_generator.cleanup_temp_files().await;

    info!(meditation_id = %meditation_id, path = %audio_path, "Generation complete");
    Ok(GenerationTaskResult::completed(script.output, audio_path))
}

/// Fire-and-forget metadata task. Writes title/description whenever it
/// finishes, even after the row has gone terminal.
fn spawn_title_task(
    state: &AppState,
    config: &MeditationConfig,
    meditation_id: Uuid,
    technique: &str,
) {
    let generator = TitleDescriptionGenerator::new(state.text.clone(), &state.settings.title_model);
    let pool = state.pool.clone();
    let purpose = config.purpose.clone();
    let technique = technique.to_string();
    let language = config.language.display_name().to_string();

    tokio::spawn(async move {
        match generator.generate(&purpose, &technique, &language).await {
            Ok(result) => {
                if let Err(e) = meditations::set_title_description(
                    &pool,
                    meditation_id,
                    &result.title,
                    &result.description,
                )
                .await
                {
                    error!(meditation_id = %meditation_id, error = %e, "Failed to store title and description");
                }
            }
            Err(e) => {
                error!(meditation_id = %meditation_id, error = %e, "Title and description generation failed");
            }
        }
    });
}

/// Charge the session against the user's credit balance. The voice used
/// for pricing mirrors the audio generator's resolution: requested voice
/// when known, catalog default otherwise.
async fn deduct_credits(state: &AppState, config: &MeditationConfig) -> Result<()> {
    let voice = match config.voice_id.as_deref() {
        Some(id) => match voices::get_voice(&state.pool, id).await? {
            Some(voice) => voice,
            None => voices::default_voice(&state.pool).await?,
        },
        None => voices::default_voice(&state.pool).await?,
    };

    let track_multiplier = match config.bg_track.as_deref() {
        Some(id) => voices::get_bg_track(&state.pool, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Background track '{}' not in catalog", id)))?
            .price_multiplier,
        None => 1.0,
    };

    let cost = profiles::job_cost(config.duration, voice.price_multiplier, track_multiplier);
    profiles::add_credits_used(&state.pool, &config.user_id, cost).await?;

    info!(
        user_id = %config.user_id,
        cost,
        voice_multiplier = voice.price_multiplier,
        track_multiplier,
        "Credits deducted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::db;
    use crate::media::MediaAdapter;
    use crate::models::{Language, MeditationStatus};
    use crate::services::storage::ObjectStore;
    use crate::services::text_client::TextGenerator;
    use crate::services::tts_client::{SpeechSynthesizer, VoiceSettings};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

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
                Ok(json!({"title": "Quiet Harbor", "description": "A calm drift into rest."}))
            } else {
                Ok(json!({
                    "sections": [
                        {"type": "intro", "techniqueName": "Sequential Zone Mapping",
                         "content": ["Welcome.", "Settle in."]},
                        {"type": "outro", "techniqueName": "Sequential Zone Mapping",
                         "content": ["Return gently."]}
                    ],
                    "techniques": ["Sequential Zone Mapping"],
                    "purposeAlignment": "test alignment"
                }))
            }
        }
    }

    struct SilentSpeech;

    #[async_trait]
    impl SpeechSynthesizer for SilentSpeech {
        async fn synthesize(
            &self,
            _voice_id: &str,
            _settings: &VoiceSettings,
            text: &str,
        ) -> Result<Vec<u8>> {
            Ok(text.as_bytes().to_vec())
        }
    }

    struct FakeStore;

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn upload(&self, _: &str, _: &str, _: &[u8], _: &str) -> Result<()> {
            Ok(())
        }
        async fn download(&self, _: &str, path: &str) -> Result<Vec<u8>> {
            Ok(path.as_bytes().to_vec())
        }
        async fn signed_url(&self, _: &str, path: &str, _: u32) -> Result<String> {
            Ok(format!("https://example.test/{}", path))
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

    /// Media adapter whose mixdown either succeeds or fails, for exercising
    /// both terminal paths.
    struct ScriptedMedia {
        fail_mix: bool,
    }

    #[async_trait]
    impl MediaAdapter for ScriptedMedia {
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
            Ok(300.0)
        }
        async fn mix_to_storage(
            &self,
            _: &[u8],
            _: &[u8],
            _: f64,
            _: &str,
            user_id: &str,
        ) -> Result<String> {
            if self.fail_mix {
                Err(Error::Media {
                    message: "mixdown exploded".to_string(),
                    stderr: String::new(),
                })
            } else {
                Ok(format!("{}/meditation-1.m4a", user_id))
            }
        }
    }

    fn settings() -> Settings {
        Settings {
            database_path: PathBuf::from(":memory:"),
            text_api_key: "k".to_string(),
            text_api_base_url: "https://example.test".to_string(),
            script_model: "script-model".to_string(),
            title_model: "title-model".to_string(),
            speech_api_key: "k".to_string(),
            speech_api_base_url: "https://example.test".to_string(),
            speech_model_id: "m".to_string(),
            storage_base_url: "https://example.test".to_string(),
            storage_service_key: "k".to_string(),
            assets_bucket: "meditation-assets".to_string(),
            temp_bucket: "temp-files".to_string(),
            output_bucket: "meditation-output".to_string(),
            media_binary_path: PathBuf::from("ffmpeg"),
        }
    }

    async fn state(fail_mix: bool) -> AppState {
        AppState {
            pool: db::init_memory_pool().await.unwrap(),
            settings: settings(),
            text: Arc::new(ScriptedText),
            speech: Arc::new(SilentSpeech),
            store: Arc::new(FakeStore),
            media: Arc::new(ScriptedMedia { fail_mix }),
        }
    }

    fn config() -> MeditationConfig {
        MeditationConfig {
            purpose: "wind down".to_string(),
            duration: 10,
            beginner: true,
            language: Language::En,
            voice_id: None,
            bg_track: Some("gentle".to_string()),
            user_id: "user-1".to_string(),
        }
    }

    async fn single_record(state: &AppState) -> MeditationRecord {
        let id: String = sqlx::query_scalar("SELECT id FROM meditations")
            .fetch_one(&state.pool)
            .await
            .unwrap();
        meditations::load(&state.pool, id.parse().unwrap())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn successful_run_completes_and_charges() {
        let state = state(false).await;
        let result = run_generation(&state, config()).await;

        assert!(result.success, "run failed: {:?}", result.error);
        assert_eq!(result.audio_path.as_deref(), Some("user-1/meditation-1.m4a"));

        let record = single_record(&state).await;
        assert_eq!(record.status, MeditationStatus::Completed);
        assert_eq!(record.storage_path.as_deref(), Some("user-1/meditation-1.m4a"));
        assert!(record.completed_at.is_some());
        assert!(record.script.is_some());

        // Default voice multiplier 1.0, gentle track 1.0: 10 minutes = 10
        let used = profiles::credits_used(&state.pool, "user-1").await.unwrap();
        assert_eq!(used, 10);

        // The detached metadata task lands eventually
        let mut titled = false;
        for _ in 0..40 {
            if single_record(&state).await.title.is_some() {
                titled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(titled, "title never written by side task");
    }

    #[tokio::test]
    async fn mixdown_failure_marks_failed_without_charging() {
        let state = state(true).await;
        let result = run_generation(&state, config()).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("mixdown exploded"));

        let record = single_record(&state).await;
        assert_eq!(record.status, MeditationStatus::Failed);
        assert!(record.storage_path.is_none());
        assert!(record.error_message.unwrap().contains("mixdown exploded"));

        // No charge for a failed run
        let used = profiles::credits_used(&state.pool, "user-1").await.unwrap();
        assert_eq!(used, 0);
    }

    #[tokio::test]
    async fn unsupported_duration_fails_before_audio() {
        let state = state(false).await;
        let mut bad = config();
        bad.duration = 7;

        let result = run_generation(&state, bad).await;
        assert!(!result.success);

        let record = single_record(&state).await;
        assert_eq!(record.status, MeditationStatus::Failed);

        let used = profiles::credits_used(&state.pool, "user-1").await.unwrap();
        assert_eq!(used, 0);
    }
}
