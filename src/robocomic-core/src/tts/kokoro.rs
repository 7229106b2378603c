use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use kokoro_tiny::TtsEngine;
use tracing::{debug, info};

use super::{AudioPayload, KOKORO_SAMPLE_RATE, SpeechBackend, split_into_chunks};
use crate::error::ComicError;
use crate::persona::Language;

/// Kokoro has a ~200 character safe limit per call.
const MAX_CHUNK_CHARS: usize = 200;
/// 0.3s between chunks.
const CHUNK_GAP_SAMPLES: usize = 7_200;
/// 0.5s at the end to prevent the last word being cut off.
const TRAILING_PAD_SAMPLES: usize = 12_000;

/// Local kokoro-tiny synthesis. The engine is not reentrant, so calls are
/// serialized, and run on the blocking pool.
pub struct KokoroBackend {
    engine: Arc<Mutex<TtsEngine>>,
    available_voices: Vec<String>,
    default_voice_id: String,
}

impl KokoroBackend {
    /// Initialize the engine (downloads the model on first run).
    pub async fn new(default_voice_id: impl Into<String>) -> Result<Self, ComicError> {
        let engine = TtsEngine::new()
            .await
            .map_err(|e| ComicError::TtsError(format!("Failed to initialize TTS: {}", e)))?;
        let available_voices = engine.voices();

        let backend = Self {
            engine: Arc::new(Mutex::new(engine)),
            available_voices,
            default_voice_id: default_voice_id.into(),
        };
        backend.validate_voice(&backend.default_voice_id)?;
        info!(voices = backend.available_voices.len(), "Kokoro engine ready");
        Ok(backend)
    }

    pub fn available_voices(&self) -> &[String] {
        &self.available_voices
    }

    pub fn validate_voice(&self, voice_id: &str) -> Result<(), ComicError> {
        if voice_id.is_empty() {
            return Err(ComicError::TtsError(format!(
                "Voice ID cannot be empty. Available voices:\n{}",
                self.format_available_voices()
            )));
        }

        if !self.available_voices.iter().any(|v| v == voice_id) {
            return Err(ComicError::TtsError(format!(
                "Unknown voice '{}'. Available voices:\n{}",
                voice_id,
                self.format_available_voices()
            )));
        }

        Ok(())
    }

    fn format_available_voices(&self) -> String {
        let mut english_voices: Vec<&String> = self
            .available_voices
            .iter()
            .filter(|v| {
                v.starts_with("af_") || v.starts_with("am_") || v.starts_with("bf_") || v.starts_with("bm_")
            })
            .collect();
        english_voices.sort();

        english_voices
            .iter()
            .map(|v| format!("  - {}", v))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl SpeechBackend for KokoroBackend {
    fn name(&self) -> &'static str {
        "kokoro"
    }

    // Kokoro voices are language-bound by id; `lang` is not used.
    async fn synthesize(
        &self,
        text: &str,
        _lang: Language,
        voice_id: Option<&str>,
    ) -> Result<AudioPayload, ComicError> {
        let voice_id = voice_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.default_voice_id);
        self.validate_voice(voice_id)?;

        let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
        debug!(voice_id, chunks = chunks.len(), "Synthesizing with kokoro");

        let engine = Arc::clone(&self.engine);
        let voice = voice_id.to_string();
        let rendered = tokio::task::spawn_blocking(move || {
            let mut engine = engine
                .lock()
                .map_err(|_| ComicError::TtsError("Kokoro engine lock poisoned".to_string()))?;
            chunks
                .iter()
                .map(|chunk| {
                    engine
                        .synthesize(chunk, Some(voice.as_str()))
                        .map_err(|e| ComicError::TtsError(format!("Synthesis failed: {}", e)))
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(|e| ComicError::TtsError(format!("Synthesis task failed: {}", e)))??;

        let samples = join_with_padding(rendered);
        Ok(AudioPayload::Samples {
            samples,
            sample_rate: KOKORO_SAMPLE_RATE,
        })
    }
}

/// Concatenate chunk audio with a gap after each chunk and trailing padding.
fn join_with_padding(chunks: Vec<Vec<f32>>) -> Vec<f32> {
    let mut samples = Vec::new();
    for chunk in chunks {
        samples.extend(chunk);
        samples.extend(std::iter::repeat_n(0.0, CHUNK_GAP_SAMPLES));
    }
    samples.extend(std::iter::repeat_n(0.0, TRAILING_PAD_SAMPLES));
    samples
}
