//! Audio duration probing
//!
//! Planned section durations are estimates; the mix is cut to the real
//! length of the synthesized voice track, so duration comes from the
//! rendered audio itself.

use calma_common::{Error, Result};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Measure the duration of an in-memory audio buffer in seconds.
///
/// Uses the container's frame count when the codec parameters carry one;
/// otherwise walks packets and sums their timestamps (the common case for
/// MP3 streams without a duration header).
pub fn duration_seconds(bytes: &[u8]) -> Result<f64> {
    let cursor = std::io::Cursor::new(bytes.to_vec());
    let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Internal(format!("Failed to probe audio: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| Error::Internal("Audio has no default track".to_string()))?;

    let track_id = track.id;
    let time_base = track.codec_params.time_base;

    if let (Some(tb), Some(n_frames)) = (time_base, track.codec_params.n_frames) {
        let time = tb.calc_time(n_frames);
        return Ok(time.seconds as f64 + time.frac);
    }

    let tb = time_base
        .ok_or_else(|| Error::Internal("Audio track has no time base".to_string()))?;

    let mut total_ts = 0u64;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    total_ts += packet.dur();
                }
            }
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(Error::Internal(format!(
                    "Failed to read audio packets: {}",
                    e
                )))
            }
        }
    }

    if total_ts == 0 {
        return Err(Error::Internal(
            "Duration not found in audio metadata".to_string(),
        ));
    }

    let time = tb.calc_time(total_ts);
    Ok(time.seconds as f64 + time.frac)
}
