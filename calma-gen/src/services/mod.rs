//! Service layer: external clients and the generation services built on
//! top of them.

pub mod audio_generator;
pub mod script_generator;
pub mod storage;
pub mod text_client;
pub mod title_description;
pub mod tts_client;

pub use audio_generator::AudioGenerator;
pub use script_generator::ScriptGenerator;
pub use storage::{ObjectStore, StorageClient};
pub use text_client::{OpenAiClient, TextGenerator};
pub use title_description::TitleDescriptionGenerator;
pub use tts_client::{ElevenLabsClient, SpeechSynthesizer, VoiceSettings};
