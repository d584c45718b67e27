use tavira::application::services::audio_duration::{
    container_duration_seconds, estimate_seconds_from_size,
};
use tavira::domain::AudioFormat;

use crate::application::support::make_wav;

#[test]
fn given_wav_container_when_probing_then_duration_is_exact() {
    // Half a second of 16 kHz mono PCM.
    let wav = make_wav(16_000, 8_000);

    let seconds = container_duration_seconds(&wav, AudioFormat::Wav).unwrap();

    assert!((seconds - 0.5).abs() < 1e-9, "got {}", seconds);
}

#[test]
fn given_longer_wav_container_when_probing_then_duration_scales_with_samples() {
    let wav = make_wav(16_000, 48_000);

    let seconds = container_duration_seconds(&wav, AudioFormat::Wav).unwrap();

    assert!((seconds - 3.0).abs() < 1e-9, "got {}", seconds);
}

#[test]
fn given_unparseable_bytes_when_probing_then_no_duration_is_reported() {
    let garbage = vec![0x13u8; 256];

    assert!(container_duration_seconds(&garbage, AudioFormat::Wav).is_none());
    assert!(container_duration_seconds(&garbage, AudioFormat::Mp3).is_none());
}

#[test]
fn given_byte_length_when_estimating_then_nominal_bitrate_is_used() {
    // 32000 bytes at 256 kbit/s of PCM is exactly one second.
    let wav_estimate = estimate_seconds_from_size(32_000, AudioFormat::Wav);
    assert!((wav_estimate - 1.0).abs() < 1e-9, "got {}", wav_estimate);

    // 16000 bytes at 128 kbit/s MP3 is exactly one second.
    let mp3_estimate = estimate_seconds_from_size(16_000, AudioFormat::Mp3);
    assert!((mp3_estimate - 1.0).abs() < 1e-9, "got {}", mp3_estimate);
}
