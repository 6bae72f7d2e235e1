//! Generation workflow
//!
//! The orchestrator that drives one job from config to finished session,
//! and the result contract handed back to the durable environment.

pub mod pipeline;

pub use pipeline::run_generation;

use crate::models::MeditationOutput;
use serde::Serialize;

/// Result contract returned to the durable-task environment. Exactly one
/// of the success and failure field groups is populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTaskResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meditation_output: Option<MeditationOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl GenerationTaskResult {
    pub fn completed(output: MeditationOutput, audio_path: String) -> Self {
        Self {
            success: true,
            meditation_output: Some(output),
            audio_path: Some(audio_path),
            generated_at: Some(chrono::Utc::now().to_rfc3339()),
            error: None,
            stack: None,
        }
    }

    pub fn failed(error: &calma_common::Error) -> Self {
        Self {
            success: false,
            meditation_output: None,
            audio_path: None,
            generated_at: None,
            error: Some(error.to_string()),
            stack: Some(format!("{:?}", error)),
        }
    }
}
