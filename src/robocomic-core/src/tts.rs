//! Speech synthesis.
//!
//! Backends return either encoded audio from a network service or raw
//! samples from a local engine. [`AudioPayload::into_wav`] folds both into a
//! WAV body.

use std::io::Cursor;

use async_trait::async_trait;

use crate::error::ComicError;
use crate::persona::Language;

mod elevenlabs;
#[cfg(feature = "kokoro")]
mod kokoro;

pub use elevenlabs::{ELEVENLABS_API_BASE, ElevenLabsBackend};
#[cfg(feature = "kokoro")]
pub use kokoro::KokoroBackend;

/// Sample rate of the local kokoro engine.
pub const KOKORO_SAMPLE_RATE: u32 = 24_000;

/// Audio produced by a [`SpeechBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum AudioPayload {
    /// Already-encoded audio, passed through as-is.
    Encoded { bytes: Vec<u8> },
    /// Mono samples in [-1.0, 1.0].
    Samples { samples: Vec<f32>, sample_rate: u32 },
}

impl AudioPayload {
    pub fn into_wav(self) -> Result<Vec<u8>, ComicError> {
        match self {
            AudioPayload::Encoded { bytes } => Ok(bytes),
            AudioPayload::Samples {
                samples,
                sample_rate,
            } => encode_wav(&samples, sample_rate),
        }
    }
}

/// "Synthesize audio."
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// `voice_id` of `None` selects the backend's default voice.
    async fn synthesize(
        &self,
        text: &str,
        lang: Language,
        voice_id: Option<&str>,
    ) -> Result<AudioPayload, ComicError>;
}

/// Encode samples as 16-bit PCM mono WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, ComicError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

/// Voice ids are opaque provider tokens: ASCII letters, digits, `_` and `-`.
pub fn is_valid_voice_id(voice_id: &str) -> bool {
    !voice_id.is_empty()
        && voice_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Split text into chunks that are safe for local synthesis.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk = String::new();
            }

            // Overlong sentence: fall back to commas
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars && !current_chunk.is_empty() {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk = String::new();
                    }
                    current_chunk.push_str(part.trim());
                    current_chunk.push(' ');
                }
            } else {
                current_chunk.push_str(sentence);
                current_chunk.push(' ');
            }
        } else {
            current_chunk.push_str(sentence);
            current_chunk.push(' ');
        }
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// Combine multiple audio segments with silence gaps.
pub fn combine_audio_segments(segments: Vec<Vec<f32>>, gap_seconds: f32, sample_rate: u32) -> Vec<f32> {
    let gap_samples = (gap_seconds * sample_rate as f32) as usize;
    let silence: Vec<f32> = vec![0.0; gap_samples];

    let mut combined = Vec::new();

    for (i, segment) in segments.into_iter().enumerate() {
        if i > 0 {
            combined.extend(&silence);
        }
        combined.extend(segment);
    }

    combined
}

/// File name for a saved show.
pub fn generate_output_filename(comedian1: &str, comedian2: &str, topic: &str) -> String {
    let title = if topic.trim().is_empty() {
        format!("{comedian1} vs {comedian2}")
    } else {
        format!("{comedian1} vs {comedian2} - {}", topic.trim())
    };

    let sanitized: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(60)
        .collect();

    format!("RoboComic - {}.wav", sanitized.trim())
}
