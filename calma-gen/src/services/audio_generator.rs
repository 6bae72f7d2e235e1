//! Voice-track rendering and final mix
//!
//! Turns a generated script into the finished session audio: per-phrase
//! synthesis in bounded batches, fixed silence gaps between phrases and
//! sections, section concatenation, then a background bed trimmed and
//! faded to the measured voice length and mixed underneath.
//!
//! **[GEN-AU-010]** All intermediate objects live under a per-run
//! correlation id in the temp bucket so concurrent runs never collide and
//! cleanup is a single prefix delete.

use calma_common::{Error, Result};
use futures::future::join_all;
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::voices;
use crate::media::MediaAdapter;
use crate::models::{MeditationOutput, SectionKind};
use crate::services::storage::ObjectStore;
use crate::services::tts_client::{SpeechSynthesizer, VoiceSettings};

/// Phrases synthesized concurrently in one batch
const SYNTHESIS_CONCURRENCY: usize = 4;
/// Silence inserted before the first spoken phrase
const LEADING_SILENCE_SECONDS: u32 = 3;

/// Durations with a pre-rendered silence asset; anything else is cut from
/// the long master
const SILENCE_MASTER: &str = "silence_5minutes.mp3";

pub struct AudioGenerator {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    store: Arc<dyn ObjectStore>,
    media: Arc<dyn MediaAdapter>,
    voice_id: String,
    voice_settings: VoiceSettings,
    bg_track: String,
    assets_bucket: String,
    temp_bucket: String,
    user_id: String,
    correlation_id: String,
}

impl AudioGenerator {
    /// Resolve the voice from the catalog and build a generator bound to
    /// one run. An unknown requested voice falls back to the catalog
    /// default with a warning rather than failing the job; a missing
    /// default is a hard error.
    #[allow(clippy::too_many_arguments)]
    pub async fn resolve(
        pool: &SqlitePool,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        store: Arc<dyn ObjectStore>,
        media: Arc<dyn MediaAdapter>,
        requested_voice_id: Option<&str>,
        bg_track: Option<&str>,
        assets_bucket: &str,
        temp_bucket: &str,
        user_id: &str,
    ) -> Result<Self> {
        let voice = match requested_voice_id {
            Some(id) => match voices::get_voice(pool, id).await? {
                Some(voice) => voice,
                None => {
                    let fallback = voices::default_voice(pool).await?;
                    warn!(
                        requested_voice_id = id,
                        fallback_voice_id = %fallback.voice_id,
                        "Unknown voice id, falling back to default"
                    );
                    fallback
                }
            },
            None => voices::default_voice(pool).await?,
        };

        info!(voice_id = %voice.voice_id, voice = %voice.name, "Voice configuration resolved");

        Ok(Self {
            synthesizer,
            store,
            media,
            voice_settings: VoiceSettings::for_speed(voice.speed),
            voice_id: voice.voice_id,
            bg_track: bg_track.unwrap_or("gentle").to_string(),
            assets_bucket: assets_bucket.to_string(),
            temp_bucket: temp_bucket.to_string(),
            user_id: user_id.to_string(),
            correlation_id: new_correlation_id(),
        })
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Render the full session and return its output-bucket path
    pub async fn generate_from_script(&self, output: &MeditationOutput) -> Result<String> {
        info!(
            correlation_id = %self.correlation_id,
            sections = output.sections.len(),
            "Starting audio generation"
        );

        let mut voice_buffers: Vec<Vec<u8>> = Vec::with_capacity(output.sections.len());

        for (section_index, section) in output.sections.iter().enumerate() {
            let is_last_section = section_index == output.sections.len() - 1;
            info!(
                section = section_index + 1,
                kind = ?section.kind,
                total_sections = output.sections.len(),
                "Rendering section"
            );

            let phrases = split_content(&section.content);
            if phrases.is_empty() {
                warn!(section = section_index + 1, "Section has no spoken content, skipping");
                continue;
            }

            let spoken = self.synthesize_phrases(&phrases, section_index).await?;

            let mut section_buffers: Vec<Vec<u8>> = Vec::with_capacity(spoken.len() * 2);
            let interior_gap = interior_gap_seconds(section.kind);
            let trailing_gap = trailing_gap_seconds(section.kind, is_last_section);

            for (phrase_index, audio) in spoken.into_iter().enumerate() {
                section_buffers.push(audio);
                let gap = if phrase_index == phrases.len() - 1 {
                    trailing_gap
                } else {
                    interior_gap
                };
                section_buffers.push(self.exact_silence(gap).await?);
            }

            let section_voice = self
                .media
                .concat(section_buffers, &self.correlation_id)
                .await?;
            voice_buffers.push(section_voice);
        }

        if voice_buffers.is_empty() {
            return Err(Error::Validation {
                message: "Script produced no renderable sections".to_string(),
                raw_text: None,
                cause: None,
            });
        }

        info!("Assembling full voice track");
        let mut full_track = Vec::with_capacity(voice_buffers.len() + 1);
        full_track.push(self.exact_silence(LEADING_SILENCE_SECONDS).await?);
        full_track.extend(voice_buffers);
        let full_voice = self.media.concat(full_track, &self.correlation_id).await?;

        let voice_duration = self.media.measure_duration(&full_voice).await?;
        info!(duration_seconds = voice_duration, "Voice track duration measured");

        let background = self.full_background(voice_duration).await?;
        let background = self
            .media
            .fade_out(
                &background,
                voice_duration,
                crate::media::mastering::FADE_OUT_SECONDS,
                &self.correlation_id,
            )
            .await?;

        info!("Mixing voice over background");
        let storage_path = self
            .media
            .mix_to_storage(
                &background,
                &full_voice,
                voice_duration,
                &self.correlation_id,
                &self.user_id,
            )
            .await?;

        info!(path = %storage_path, "Audio pipeline complete");
        Ok(storage_path)
    }

    /// Synthesize phrases in batches of [`SYNTHESIS_CONCURRENCY`],
    /// restoring script order regardless of completion order.
    async fn synthesize_phrases(
        &self,
        phrases: &[String],
        section_index: usize,
    ) -> Result<Vec<Vec<u8>>> {
        let mut ordered: Vec<Vec<u8>> = Vec::with_capacity(phrases.len());

        for (batch_number, batch) in phrases.chunks(SYNTHESIS_CONCURRENCY).enumerate() {
            let batch_start = batch_number * SYNTHESIS_CONCURRENCY;
            let futures = batch.iter().enumerate().map(|(offset, phrase)| {
                let index = batch_start + offset;
                async move {
                    info!(
                        section = section_index + 1,
                        phrase = index + 1,
                        total_phrases = phrases.len(),
                        "Synthesizing phrase"
                    );
                    let audio = self
                        .synthesizer
                        .synthesize(&self.voice_id, &self.voice_settings, phrase)
                        .await?;
                    Ok::<(usize, Vec<u8>), Error>((index, audio))
                }
            });

            let mut results = join_all(futures)
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?;
            results.sort_by_key(|(index, _)| *index);
            ordered.extend(results.into_iter().map(|(_, audio)| audio));
        }

        Ok(ordered)
    }

    /// Silence of an exact length: a pre-rendered asset when one exists,
    /// otherwise a cut from the long silence master.
    async fn exact_silence(&self, seconds: u32) -> Result<Vec<u8>> {
        match silence_asset_name(seconds) {
            Some(asset) => self.fetch_asset(asset).await,
            None => {
                let master = self.fetch_asset(SILENCE_MASTER).await?;
                self.media
                    .trim(&master, f64::from(seconds), &self.correlation_id)
                    .await
            }
        }
    }

    async fn full_background(&self, duration_seconds: f64) -> Result<Vec<u8>> {
        let asset = if self.bg_track == "silence" {
            SILENCE_MASTER.to_string()
        } else {
            format!("{}.mp3", self.bg_track)
        };
        let buffer = self.fetch_asset(&asset).await?;
        self.media
            .trim(&buffer, duration_seconds, &self.correlation_id)
            .await
    }

    async fn fetch_asset(&self, asset_name: &str) -> Result<Vec<u8>> {
        self.store
            .download(&self.assets_bucket, asset_name)
            .await
            .map_err(|e| {
                error!(bucket = %self.assets_bucket, asset = asset_name, error = %e, "Asset fetch failed");
                e
            })
    }

    /// Best-effort removal of everything under this run's temp prefix
    pub async fn cleanup_temp_files(&self) {
        info!(
            bucket = %self.temp_bucket,
            correlation_id = %self.correlation_id,
            "Cleaning up temp objects"
        );

        let files = match self.store.list(&self.temp_bucket, &self.correlation_id).await {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "Temp listing failed");
                return;
            }
        };
        if files.is_empty() {
            return;
        }

        let paths: Vec<String> = files
            .iter()
            .map(|name| format!("{}/{}", self.correlation_id, name))
            .collect();
        match self.store.delete(&self.temp_bucket, &paths).await {
            Ok(()) => info!(deleted = paths.len(), "Temp cleanup complete"),
            Err(e) => error!(error = %e, "Temp deletion failed"),
        }
    }
}

/// Per-run namespace for temp objects. Millisecond timestamp plus a short
/// random suffix keeps concurrent runs disjoint.
fn new_correlation_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(rand::distributions::Alphanumeric)
        .take(9)
        .map(|c| (c as char).to_ascii_lowercase())
        .collect();
    format!("{}-{}", chrono::Utc::now().timestamp_millis(), suffix)
}

/// Normalize section content into spoken phrases. Lines are trimmed and
/// blanks dropped; a section that collapsed to a single line is split on
/// sentence-final punctuation across scripts so no single synthesis
/// request carries a whole paragraph.
fn split_content(content: &[String]) -> Vec<String> {
    let lines: Vec<String> = content
        .iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() != 1 {
        return lines;
    }

    split_sentences(&lines[0])
}

const SENTENCE_TERMINATORS: &[char] = &['.', '?', '!', '。', '！', '？', '।', '॥', '…', '．'];

fn split_sentences(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if SENTENCE_TERMINATORS.contains(&ch) {
            let phrase = current.trim();
            if !phrase.is_empty() {
                phrases.push(phrase.to_string());
            }
            current.clear();
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        phrases.push(tail.to_string());
    }
    phrases
}

/// Gap between consecutive phrases within a section
fn interior_gap_seconds(kind: SectionKind) -> u32 {
    match kind {
        SectionKind::Breathing => 10,
        _ => 4,
    }
}

/// Gap after a section's final phrase. Breathing sections always get the
/// long pause; otherwise only the session's last section does.
fn trailing_gap_seconds(kind: SectionKind, is_last_section: bool) -> u32 {
    if kind == SectionKind::Breathing || is_last_section {
        20
    } else {
        10
    }
}

fn silence_asset_name(seconds: u32) -> Option<&'static str> {
    match seconds {
        3 => Some("silence_3seconds.mp3"),
        4 => Some("silence_4seconds.mp3"),
        10 => Some("silence_10seconds.mp3"),
        20 => Some("silence_20seconds.mp3"),
        _ => None,
    }
}
