//! Session title and description metadata
//!
//! Runs after the session is already durable; failures here are logged
//! and never affect the job outcome.

use calma_common::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::services::text_client::{into_schema, TextGenerator};

// Higher temperature than the script: titles should vary between runs
const TITLE_TEMPERATURE: f32 = 1.0;

#[derive(Debug, Clone, Deserialize)]
pub struct TitleDescription {
    pub title: String,
    pub description: String,
}

pub struct TitleDescriptionGenerator {
    client: Arc<dyn TextGenerator>,
    model: String,
}

impl TitleDescriptionGenerator {
    pub fn new(client: Arc<dyn TextGenerator>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub async fn generate(
        &self,
        purpose: &str,
        technique: &str,
        language: &str,
    ) -> Result<TitleDescription> {
        let prompt = build_prompt(purpose, technique, language);
        info!(technique, language, "Requesting session title and description");

        let value = self
            .client
            .generate_json(&self.model, &prompt, TITLE_TEMPERATURE)
            .await?;
        let result: TitleDescription = into_schema(value)?;

        info!(title = %result.title, "Title and description generated");
        Ok(result)
    }
}

fn build_prompt(purpose: &str, technique: &str, language: &str) -> String {
    format!(
        r#"Generate a highly creative concise title (3–7 words) and a brief description (about 20 words) in {language} for a guided deep rest session.
The title should creatively encapsulate the goal of the session based on its purpose and technique.
The description should succinctly explain what the user will achieve through this session in a creative way.

Inputs:
- Purpose: "{purpose}"
- Technique: "{technique}"

Return the output as valid JSON matching the following schema:
{{
  "title": "your title",
  "description": "your description"
}}
"#
    )
}
