//! PCM helpers for the speech-to-text path: sample conversion and WAV
//! packaging of recorded microphone audio.

use crate::error::TransportError;
use std::ops::RangeInclusive;

/// Sample rate recordings are captured at unless the client says otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 16000;
/// Longest recording accepted for a single voice command.
pub const MAX_RECORDING_SECS: u32 = 10;
/// Size of the RIFF/WAVE header written by [`encode_wav`].
pub const WAV_HEADER_LEN: usize = 44;
/// Sample rates accepted from clients, in Hz.
pub const SAMPLE_RATE_RANGE: RangeInclusive<u32> = 8_000..=48_000;

/// Checks a client-supplied sample rate against [`SAMPLE_RATE_RANGE`].
pub fn validate_sample_rate(sample_rate: u32) -> Result<u32, TransportError> {
    if SAMPLE_RATE_RANGE.contains(&sample_rate) {
        Ok(sample_rate)
    } else {
        Err(TransportError::InvalidAudio(format!(
            "sample rate {} Hz is outside {}..={} Hz",
            sample_rate,
            SAMPLE_RATE_RANGE.start(),
            SAMPLE_RATE_RANGE.end()
        )))
    }
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Interprets little-endian byte pairs as i16 samples. A trailing odd byte is dropped.
pub fn decode_pcm16_le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect()
}

/// Maximum number of samples kept for one recording.
pub fn max_recording_samples(sample_rate: u32, channels: u16) -> usize {
    sample_rate as usize * channels as usize * MAX_RECORDING_SECS as usize
}

/// Wraps 16-bit PCM samples in an in-memory WAV file.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    // Header fields are 32-bit; oversized values saturate instead of wrapping.
    let data_len = u32::try_from(samples.len() * 2).unwrap_or(u32::MAX);
    let block_align = channels.saturating_mul(2);
    let byte_rate = sample_rate.saturating_mul(u32::from(block_align));

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&data_len.saturating_add(36).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }
    wav
}

/// Quick check that a payload starts like a RIFF/WAVE file.
pub fn looks_like_wav(bytes: &[u8]) -> bool {
    bytes.len() >= WAV_HEADER_LEN && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}
