//! Media processing: thin wrappers over the external ffmpeg binary plus
//! duration probing of rendered audio.

pub mod ffmpeg;
pub mod probe;

use async_trait::async_trait;
use calma_common::Result;

/// Mastering defaults. Tunable values, not a wire contract: the gains
/// were picked by ear to keep perceived loudness steady after mixing.
pub mod mastering {
    /// Background level under the voice during the mix
    pub const BG_ATTENUATION: f64 = 0.6;
    /// Post-mix makeup gain
    pub const MIX_BOOST: f64 = 1.2;
    /// Background fade-out length, ending at the voice track's end
    pub const FADE_OUT_SECONDS: f64 = 5.0;
    /// Final output bitrate
    pub const OUTPUT_BITRATE: &str = "96k";
}

/// Seam for the media operations the audio generator needs. The
/// production implementation shells out to ffmpeg with assets staged in
/// temp storage; tests substitute buffer arithmetic.
#[async_trait]
pub trait MediaAdapter: Send + Sync {
    /// Trim audio to the given duration
    async fn trim(&self, input: &[u8], seconds: f64, prefix: &str) -> Result<Vec<u8>>;

    /// Concatenate audio buffers in order
    async fn concat(&self, buffers: Vec<Vec<u8>>, prefix: &str) -> Result<Vec<u8>>;

    /// Apply a fade-out ending at `total_seconds`
    async fn fade_out(
        &self,
        input: &[u8],
        total_seconds: f64,
        fade_seconds: f64,
        prefix: &str,
    ) -> Result<Vec<u8>>;

    /// Real duration of rendered audio, from container metadata
    async fn measure_duration(&self, input: &[u8]) -> Result<f64>;

    /// Mix voice over background and persist the finalized file, returning
    /// the storage path of the uploaded output
    async fn mix_to_storage(
        &self,
        background: &[u8],
        voice: &[u8],
        duration_seconds: f64,
        prefix: &str,
        user_id: &str,
    ) -> Result<String>;
}
