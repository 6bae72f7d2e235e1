//! Data models for calma-gen

pub mod meditation;

pub use meditation::{
    Language, MeditationConfig, MeditationOutput, MeditationRecord, MeditationSection,
    MeditationStatus, SectionKind,
};
