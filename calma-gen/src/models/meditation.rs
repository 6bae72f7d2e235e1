//! Meditation generation types
//!
//! **[GEN-WF-010]** A generation job progresses through the defined states:
//! PENDING → SCRIPT_GENERATED → COMPLETED, or FAILED from any state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported session languages (locale codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Fr,
    De,
    Pt,
    Ru,
    Hi,
    Zh,
    Ja,
    Ko,
}

impl Language {
    /// Human-readable name used inside generation prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Es => "Spanish",
            Language::Fr => "French",
            Language::De => "German",
            Language::Pt => "Portuguese",
            Language::Ru => "Russian",
            Language::Hi => "Hindi",
            Language::Zh => "Chinese",
            Language::Ja => "Japanese",
            Language::Ko => "Korean",
        }
    }

    /// CJK languages convey more content per line, so plans carry separate
    /// line targets for them.
    pub fn is_cjk(&self) -> bool {
        matches!(self, Language::Zh | Language::Ja | Language::Ko)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::Pt => "pt",
            Language::Ru => "ru",
            Language::Hi => "hi",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::Ko => "ko",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::En),
            "es" => Some(Language::Es),
            "fr" => Some(Language::Fr),
            "de" => Some(Language::De),
            "pt" => Some(Language::Pt),
            "ru" => Some(Language::Ru),
            "hi" => Some(Language::Hi),
            "zh" => Some(Language::Zh),
            "ja" => Some(Language::Ja),
            "ko" => Some(Language::Ko),
            _ => None,
        }
    }
}

/// Input configuration for one generation job. Immutable for the life of
/// the job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeditationConfig {
    /// Free-text purpose of the session
    pub purpose: String,
    /// Session length in minutes; must map to a known plan
    pub duration: u32,
    /// Restrict technique selection to beginner-friendly ones
    pub beginner: bool,
    pub language: Language,
    /// Voice id; falls back to the catalog default when absent or unknown
    #[serde(default)]
    pub voice_id: Option<String>,
    /// Background track id; falls back to the default track when absent
    #[serde(default)]
    pub bg_track: Option<String>,
    /// Owning user
    pub user_id: String,
}

/// One labeled segment of a generated script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Intro,
    Breathing,
    Technique,
    Outro,
}

/// One section of the generated script. `content` is an ordered list of
/// spoken lines; each element becomes an independent synthesis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeditationSection {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    #[serde(rename = "techniqueName")]
    pub technique_name: String,
    pub content: Vec<String>,
}

/// Structured script returned by the script generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeditationOutput {
    pub sections: Vec<MeditationSection>,
    pub techniques: Vec<String>,
    #[serde(rename = "purposeAlignment")]
    pub purpose_alignment: String,
}

/// **[GEN-WF-010]** Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeditationStatus {
    Pending,
    ScriptGenerated,
    Completed,
    Failed,
}

impl MeditationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeditationStatus::Pending => "pending",
            MeditationStatus::ScriptGenerated => "script_generated",
            MeditationStatus::Completed => "completed",
            MeditationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(MeditationStatus::Pending),
            "script_generated" => Some(MeditationStatus::ScriptGenerated),
            "completed" => Some(MeditationStatus::Completed),
            "failed" => Some(MeditationStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states are never left again by the owning job
    pub fn is_terminal(&self) -> bool {
        matches!(self, MeditationStatus::Completed | MeditationStatus::Failed)
    }
}

/// Persisted generation record; the job's durable state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeditationRecord {
    pub id: Uuid,
    pub user_id: String,
    pub duration_seconds: u32,
    pub language_code: String,
    pub is_beginner: bool,
    pub purpose: String,
    pub voice_id: Option<String>,
    pub background_track: Option<String>,
    pub status: MeditationStatus,
    /// Generated script blob, set once the script phase succeeds
    pub script: Option<MeditationOutput>,
    /// Selected technique name
    pub technique: Option<String>,
    /// Filled asynchronously by the title/description side task; may stay
    /// null if that task fails
    pub title: Option<String>,
    pub description: Option<String>,
    /// Storage path of the final audio, null until success
    pub storage_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl MeditationRecord {
    pub fn new(config: &MeditationConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: config.user_id.clone(),
            duration_seconds: config.duration * 60,
            language_code: config.language.code().to_string(),
            is_beginner: config.beginner,
            purpose: config.purpose.clone(),
            voice_id: config.voice_id.clone(),
            background_track: config.bg_track.clone(),
            status: MeditationStatus::Pending,
            script: None,
            technique: None,
            title: None,
            description: None,
            storage_path: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_families() {
        assert!(Language::Zh.is_cjk());
        assert!(Language::Ja.is_cjk());
        assert!(Language::Ko.is_cjk());
        assert!(!Language::En.is_cjk());
        assert!(!Language::Hi.is_cjk());
    }

    #[test]
    fn language_round_trip() {
        for code in ["en", "es", "fr", "de", "pt", "ru", "hi", "zh", "ja", "ko"] {
            let lang = Language::parse(code).unwrap();
            assert_eq!(lang.code(), code);
        }
        assert!(Language::parse("xx").is_none());
    }

    #[test]
    fn status_round_trip() {
        for status in [
            MeditationStatus::Pending,
            MeditationStatus::ScriptGenerated,
            MeditationStatus::Completed,
            MeditationStatus::Failed,
        ] {
            assert_eq!(MeditationStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn terminal_states() {
        assert!(MeditationStatus::Completed.is_terminal());
        assert!(MeditationStatus::Failed.is_terminal());
        assert!(!MeditationStatus::Pending.is_terminal());
        assert!(!MeditationStatus::ScriptGenerated.is_terminal());
    }

    #[test]
    fn section_serde_uses_wire_names() {
        let section = MeditationSection {
            kind: SectionKind::Breathing,
            technique_name: "Senses Practice".into(),
            content: vec!["Line one.".into()],
        };
        let json = serde_json::to_value(&section).unwrap();
        assert_eq!(json["type"], "breathing");
        assert_eq!(json["techniqueName"], "Senses Practice");
    }

    #[test]
    fn new_record_starts_pending() {
        let config = MeditationConfig {
            purpose: "brain reset".into(),
            duration: 5,
            beginner: true,
            language: Language::En,
            voice_id: None,
            bg_track: None,
            user_id: "user-1".into(),
        };
        let record = MeditationRecord::new(&config);
        assert_eq!(record.status, MeditationStatus::Pending);
        assert_eq!(record.duration_seconds, 300);
        assert!(record.storage_path.is_none());
        assert!(record.completed_at.is_none());
    }
}
