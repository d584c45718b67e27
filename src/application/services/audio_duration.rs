use std::io::Cursor;

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::domain::AudioFormat;

// Nominal bitrates of the synthesis output formats, for the estimate path.
const WAV_FALLBACK_KBPS: u64 = 256; // 16 kHz, 16-bit, mono PCM
const MP3_FALLBACK_KBPS: u64 = 128;

/// Reads the true duration out of the audio container when the format
/// carries one. Returns `None` when the stream cannot be probed or the
/// container does not declare its length.
pub fn container_duration_seconds(data: &[u8], format: AudioFormat) -> Option<f64> {
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.as_str());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .ok()?;

    let track = probed.format.default_track()?;
    let params = &track.codec_params;

    let n_frames = params.n_frames?;
    let sample_rate = params.sample_rate?;
    if sample_rate == 0 {
        return None;
    }

    Some(n_frames as f64 / sample_rate as f64)
}

/// Bitrate-based estimate, used only when no structural parser applies.
pub fn estimate_seconds_from_size(byte_len: usize, format: AudioFormat) -> f64 {
    let kbps = match format {
        AudioFormat::Wav => WAV_FALLBACK_KBPS,
        AudioFormat::Mp3 => MP3_FALLBACK_KBPS,
    };
    (byte_len as u64 * 8) as f64 / (kbps * 1000) as f64
}
