//! In-memory WAV encoding for synthesized audio.

use std::io::Cursor;

use super::engine::AudioResult;
use super::SpeechError;

/// Encode mono f32 samples as a 16-bit PCM WAV byte stream.
pub fn encode(audio: &AudioResult) -> Result<Vec<u8>, SpeechError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // 44-byte header + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in &audio.samples {
            // f32 [-1, 1] → i16, rounding half to even
            writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0).round_ties_even() as i16)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}
