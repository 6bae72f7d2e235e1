//! Duration-indexed session plans
//!
//! A plan is a template: section order, target spoken durations, the pause
//! inserted after each section, and line-count targets per script family.
//! `total_seconds` documents the intended session length; actual audio
//! length is measured from the rendered voice track, not enforced here.

use crate::models::SectionKind;
use calma_common::{Error, Result};

/// One planned segment of a session
#[derive(Debug, Clone, Copy)]
pub struct SectionPlan {
    pub kind: SectionKind,
    pub duration_seconds: u32,
    pub pause_after_seconds: u32,
    pub lines_for_latin: u32,
    pub lines_for_cjk: u32,
}

/// Template for one supported session duration
#[derive(Debug, Clone)]
pub struct MeditationPlan {
    pub total_seconds: u32,
    pub sections: Vec<SectionPlan>,
}

impl MeditationPlan {
    /// Line target for a section given the script family
    pub fn line_target(section: &SectionPlan, cjk: bool) -> u32 {
        if cjk {
            section.lines_for_cjk
        } else {
            section.lines_for_latin
        }
    }

    /// Number of technique-type sections in this plan
    pub fn technique_section_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| s.kind == SectionKind::Technique)
            .count()
    }
}

const fn section(
    kind: SectionKind,
    duration_seconds: u32,
    pause_after_seconds: u32,
    lines_for_latin: u32,
    lines_for_cjk: u32,
) -> SectionPlan {
    SectionPlan {
        kind,
        duration_seconds,
        pause_after_seconds,
        lines_for_latin,
        lines_for_cjk,
    }
}

fn five_minute_plan() -> MeditationPlan {
    use SectionKind::*;
    MeditationPlan {
        total_seconds: 300,
        sections: vec![
            section(Intro, 60, 10, 4, 5),
            section(Breathing, 15, 10, 3, 4),
            section(Technique, 90, 10, 6, 7),
            section(Breathing, 15, 10, 3, 4),
            section(Outro, 60, 20, 4, 5),
        ],
    }
}

fn ten_minute_plan() -> MeditationPlan {
    use SectionKind::*;
    MeditationPlan {
        total_seconds: 600,
        sections: vec![
            section(Intro, 75, 10, 5, 7),
            section(Breathing, 25, 10, 5, 6),
            section(Technique, 165, 10, 10, 12),
            section(Breathing, 25, 10, 5, 6),
            section(Technique, 165, 10, 10, 12),
            section(Outro, 75, 20, 5, 7),
        ],
    }
}

fn fifteen_minute_plan() -> MeditationPlan {
    use SectionKind::*;
    MeditationPlan {
        total_seconds: 900,
        sections: vec![
            section(Intro, 90, 10, 6, 8),
            section(Breathing, 30, 10, 7, 8),
            section(Technique, 180, 10, 12, 14),
            section(Breathing, 30, 10, 7, 8),
            section(Technique, 180, 10, 12, 14),
            section(Breathing, 30, 10, 7, 8),
            section(Technique, 170, 10, 12, 14),
            section(Outro, 90, 30, 6, 8),
        ],
    }
}

fn twenty_minute_plan() -> MeditationPlan {
    use SectionKind::*;
    MeditationPlan {
        total_seconds: 1200,
        sections: vec![
            section(Intro, 105, 10, 7, 9),
            section(Breathing, 30, 10, 9, 10),
            section(Technique, 190, 10, 12, 14),
            section(Breathing, 30, 10, 9, 10),
            section(Technique, 190, 10, 12, 14),
            section(Breathing, 30, 10, 9, 10),
            section(Technique, 185, 10, 12, 14),
            section(Breathing, 30, 10, 9, 10),
            section(Technique, 185, 10, 12, 14),
            section(Outro, 105, 30, 7, 9),
        ],
    }
}

/// Supported durations in minutes
pub const SUPPORTED_DURATIONS: [u32; 4] = [5, 10, 15, 20];

/// Look up the plan for a requested duration.
///
/// An unsupported duration is a fatal configuration error; the caller has
/// no sensible fallback.
pub fn plan_for(duration_minutes: u32) -> Result<MeditationPlan> {
    match duration_minutes {
        5 => Ok(five_minute_plan()),
        10 => Ok(ten_minute_plan()),
        15 => Ok(fifteen_minute_plan()),
        20 => Ok(twenty_minute_plan()),
        other => Err(Error::Config(format!(
            "Unsupported duration: {} minutes. Supported durations: 5, 10, 15, 20.",
            other
        ))),
    }
}
