//! Session script generation
//!
//! Builds the structured prompt for one session (plan sections, per-section
//! constraints, technique sub-foci rotation), sends it through the text
//! model, and validates the returned script shape. Line-count drift is
//! logged, never fatal: the session adapts to measured audio length.

use calma_common::{Error, Result};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{info, warn};

use crate::catalog::plans::{plan_for, MeditationPlan, SectionPlan};
use crate::catalog::techniques::{select_random, sub_foci, techniques, Technique};
use crate::models::{MeditationConfig, MeditationOutput, SectionKind};
use crate::services::text_client::{into_schema, TextGenerator};

const SCRIPT_TEMPERATURE: f32 = 0.7;

pub struct ScriptGenerator {
    client: Arc<dyn TextGenerator>,
    model: String,
}

/// Outcome of one script generation, including the technique that was
/// drawn so the title generator can reference it.
#[derive(Debug)]
pub struct GeneratedScript {
    pub output: MeditationOutput,
    pub technique_name: String,
}

impl ScriptGenerator {
    pub fn new(client: Arc<dyn TextGenerator>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub async fn generate(&self, config: &MeditationConfig) -> Result<GeneratedScript> {
        let pool = if config.beginner {
            techniques(Some(true))
        } else {
            techniques(None)
        };
        let selected = select_random(&pool, 1)
            .into_iter()
            .next()
            .ok_or_else(|| Error::Internal("Technique catalog is empty".to_string()))?;

        let plan = plan_for(config.duration)?;
        let prompt = build_prompt(config, selected, sub_foci(selected.id), &plan);

        info!(
            technique = selected.name,
            duration_minutes = config.duration,
            language = config.language.code(),
            "Requesting session script"
        );

        let value = self
            .client
            .generate_json(&self.model, &prompt, SCRIPT_TEMPERATURE)
            .await?;
        let output: MeditationOutput = into_schema(value)?;

        validate_line_counts(&output, &plan, config.language.is_cjk());

        Ok(GeneratedScript {
            output,
            technique_name: selected.name.to_string(),
        })
    }
}

/// Shuffle the technique's sub-foci, chunk them into pairs, and cycle the
/// pairs until every technique section of the plan has one. An empty
/// vocabulary yields no pairs and no per-section focus line.
fn focus_pairs(foci: &[&str], technique_sections: usize) -> Vec<Vec<String>> {
    let mut shuffled: Vec<String> = foci.iter().map(|s| s.to_string()).collect();
    shuffled.shuffle(&mut rand::thread_rng());

    let mut pairs: Vec<Vec<String>> = shuffled.chunks(2).map(|c| c.to_vec()).collect();
    if pairs.is_empty() {
        return pairs;
    }

    let mut idx = 0;
    while pairs.len() < technique_sections {
        pairs.push(pairs[idx % pairs.len()].clone());
        idx += 1;
    }
    pairs.truncate(technique_sections);
    pairs
}

fn kind_heading(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Intro => "INTRO",
        SectionKind::Breathing => "BREATHING",
        SectionKind::Technique => "TECHNIQUE",
        SectionKind::Outro => "OUTRO",
    }
}

fn format_section_prompt(
    section: &SectionPlan,
    index: usize,
    lines: u32,
    purpose: &str,
    technique_name: &str,
) -> String {
    let base = format!(
        "{}. {} ({} lines):\n   • Write exactly {} lines",
        index + 1,
        kind_heading(section.kind),
        lines,
        lines
    );

    match section.kind {
        SectionKind::Intro => format!(
            "{}\n   • Welcome and tie into the purpose: \"{}\"\n   \
             • Include position setup (seated or lying down - if sleep related only lying down) and eyes-closed cue",
            base, purpose
        ),
        SectionKind::Breathing => format!(
            "{}\n   • Begin with a transitional phrase linking to the previous section (e.g., how the breath feels in the area you just explored).\n   \
             • Remind the listener they should breathe normally unless instructed otherwise.\n   \
             • Induce the user to take 3 deep breaths through the nose and slowly fully release them through pursed lips (as if through a small straw).\n   \
             • Do not guide through the breaths",
            base
        ),
        SectionKind::Technique => format!(
            "{}\n   • Begin with a transitional phrase linking to the previous section.\n   \
             • Guide the person into the technique without mentioning its name.\n   \
             • Use the technique {} to aid the user in reaching: \"{}\". Explain sparingly how it helps.\n   \
             • Be detailed and specific. Use progression cues.\n   \
             • Be slow and calm.\n   \
             • Describe what the person might be feeling, but only sparingly.\n   \
             • Never repeat instructions; creatively deepen the practice",
            base, technique_name, purpose
        ),
        SectionKind::Outro => format!(
            "{}\n   • Begin with a transitional phrase linking to the previous section.\n   \
             • Reflect on the experience and reinforce the purpose: \"{}\".\n   \
             • If the purpose is sleep-related, guide toward sleep.\n   \
             • Otherwise, slowly induce movement back into the body",
            base, purpose
        ),
    }
}

fn build_prompt(
    config: &MeditationConfig,
    technique: &Technique,
    foci: &[&str],
    plan: &MeditationPlan,
) -> String {
    let cjk = config.language.is_cjk();
    let pairs = focus_pairs(foci, plan.technique_section_count());

    let mut pair_index = 0;
    let sections_prompt = plan
        .sections
        .iter()
        .enumerate()
        .map(|(idx, section)| {
            let lines = MeditationPlan::line_target(section, cjk);
            let mut prompt =
                format_section_prompt(section, idx, lines, &config.purpose, technique.name);
            if section.kind == SectionKind::Technique && !pairs.is_empty() {
                let group = &pairs[pair_index];
                pair_index += 1;
                prompt.push_str(&format!(
                    "\n   • In this section, focus on **{}** and tie it back to: \"{}\".",
                    group.join(" and "),
                    config.purpose
                ));
            }
            prompt
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        r#"You are a script writer for a non-spiritual guided meditation session, that uses techniques backed by neuroscience.
    Your tone should always be inviting, cordial, non-spiritual and non-cryptic language (easy to understand and follow).
Your current task is to generate a {language} meditation session to aid with this purpose: **{purpose}**
This is the selected technique: {technique_name} — {technique_description}

## Line Structure Guidelines

* Each line = 1 complete thought/phrase (1-2 sentences)
* Each section should flow like a cohesive paragraph
* Keep transitions smooth between sections
* Maintain connection between consecutive lines (e.g., "Next,", "Then,", "As you...") for continuity. If it is a long guidance it is ok to break it into 2 lines.

## Section Requirements:

{sections_prompt}

## Important Guidelines:

* Maintain a gentle, flowing tone and use invitational language
* Always be cordial and polite
* Never make affirmations or be spiritual
* Never use cryptic or difficult to understand language

## JSON Output Format

Return **only** a JSON object with keys "sections", "techniques" and "purposeAlignment".
Each element of "content" must be exactly one line (1–2 sentences).

**Example** (for a 3-line breathing section):
```json
{{
  "type": "breathing",
  "techniqueName": "<technique name in English>",
  "content": [
    "<Line 1 content>",
    "<Line 2 content>",
    "<Line 3 content>"
  ]
}}
```"#,
        language = config.language.display_name(),
        purpose = config.purpose,
        technique_name = technique.name,
        technique_description = technique.description,
        sections_prompt = sections_prompt,
    )
}

/// Compare the returned script shape against the plan, warning on drift.
/// Drift is tolerated: downstream timing is driven by measured audio, not
/// by the plan's line targets.
fn validate_line_counts(output: &MeditationOutput, plan: &MeditationPlan, cjk: bool) {
    for (idx, section) in output.sections.iter().enumerate() {
        let Some(plan_section) = plan.sections.get(idx) else {
            warn!(
                section = idx + 1,
                kind = ?section.kind,
                "Extra section not in plan; skipping line-count validation"
            );
            continue;
        };

        let expected = MeditationPlan::line_target(plan_section, cjk);
        if section.content.len() as u32 != expected {
            warn!(
                section = idx + 1,
                kind = ?section.kind,
                expected,
                actual = section.content.len(),
                "Section line count differs from plan"
            );
        }
    }

    if output.sections.len() < plan.sections.len() {
        warn!(
            actual = output.sections.len(),
            expected = plan.sections.len(),
            "Fewer sections than plan"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedClient {
        response: serde_json::Value,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerator for CannedClient {
        async fn generate_json(
            &self,
            _model: &str,
            prompt: &str,
            _temperature: f32,
        ) -> Result<serde_json::Value> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.response.clone())
        }
    }

    fn config() -> MeditationConfig {
        MeditationConfig {
            purpose: "unwind after work".to_string(),
            duration: 5,
            beginner: true,
            language: Language::En,
            voice_id: None,
            bg_track: None,
            user_id: "user-1".to_string(),
        }
    }

    fn canned_output() -> serde_json::Value {
        json!({
            "sections": [
                {"type": "intro", "techniqueName": "T", "content": ["Welcome.", "Settle in."]},
                {"type": "breathing", "techniqueName": "T", "content": ["Breathe."]},
                {"type": "technique", "techniqueName": "T", "content": ["Notice."]},
                {"type": "breathing", "techniqueName": "T", "content": ["Breathe again."]},
                {"type": "outro", "techniqueName": "T", "content": ["Return."]}
            ],
            "techniques": ["T"],
            "purposeAlignment": "calming wind-down"
        })
    }

    #[tokio::test]
    async fn generates_and_parses_script() {
        let client = Arc::new(CannedClient {
            response: canned_output(),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = ScriptGenerator::new(client.clone(), "test-model");

        let script = generator.generate(&config()).await.unwrap();
        assert_eq!(script.output.sections.len(), 5);
        assert!(!script.technique_name.is_empty());

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("unwind after work"));
        assert!(prompts[0].contains("1. INTRO"));
        assert!(prompts[0].contains("purposeAlignment"));
    }

    #[tokio::test]
    async fn schema_mismatch_surfaces_raw_payload() {
        let client = Arc::new(CannedClient {
            response: json!({"nonsense": true}),
            prompts: Mutex::new(Vec::new()),
        });
        let generator = ScriptGenerator::new(client, "test-model");

        let err = generator.generate(&config()).await.unwrap_err();
        match err {
            Error::Validation { raw_text, .. } => {
                assert!(raw_text.unwrap().contains("nonsense"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn focus_pairs_cycle_to_cover_all_sections() {
        let foci = ["a", "b", "c", "d"];
        let pairs = focus_pairs(&foci, 4);
        assert_eq!(pairs.len(), 4);
        // Every focus appears in the first two pairs
        let flattened: Vec<&str> = pairs[..2].iter().flatten().map(|s| s.as_str()).collect();
        for focus in &foci {
            assert!(flattened.contains(focus));
        }
        // Cycling reuses existing pairs rather than inventing foci
        assert_eq!(pairs[2], pairs[0]);
        assert_eq!(pairs[3], pairs[1]);
        for pair in &pairs {
            assert!(!pair.is_empty());
        }
    }

    #[test]
    fn focus_pairs_empty_vocabulary() {
        assert!(focus_pairs(&[], 3).is_empty());
    }

    #[test]
    fn section_prompt_mentions_constraints() {
        let section = crate::catalog::plans::plan_for(5).unwrap().sections[2];
        assert_eq!(section.kind, SectionKind::Technique);
        let text = format_section_prompt(&section, 2, 6, "sleep better", "Zone Mapping");
        assert!(text.contains("Write exactly 6 lines"));
        assert!(text.contains("Zone Mapping"));
        assert!(text.contains("sleep better"));
    }
}
