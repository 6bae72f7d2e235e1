//! Static catalogs: duration-indexed session plans and the technique list

pub mod plans;
pub mod techniques;

pub use plans::{plan_for, MeditationPlan, SectionPlan};
pub use techniques::{select_random, sub_foci, techniques, Technique};
