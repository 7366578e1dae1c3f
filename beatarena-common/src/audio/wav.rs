//! 16-bit PCM WAV encoding using hound

use std::io::Cursor;

use super::PcmBuffer;
use crate::{Error, Result};

/// Convert a normalized sample to signed 16-bit
///
/// Out-of-range input is clamped; negative values scale by 32768 and
/// positive values by 32767 so both extremes map exactly.
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode PCM as a canonical 44-byte-header WAV file
pub fn encode_wav(pcm: &PcmBuffer) -> Result<Vec<u8>> {
    if pcm.channels == 0 || pcm.sample_rate == 0 {
        return Err(Error::Audio("Cannot encode audio without channels or sample rate".to_string()));
    }

    let spec = hound::WavSpec {
        channels: pcm.channels,
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Audio(format!("Failed to create WAV writer: {}", e)))?;

        for &sample in &pcm.samples {
            writer
                .write_sample(sample_to_i16(sample))
                .map_err(|e| Error::Audio(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::Audio(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}
