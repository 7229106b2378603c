use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

use super::{AudioPayload, SpeechBackend, is_valid_voice_id};
use crate::error::ComicError;
use crate::persona::Language;
use crate::resilience::RetryPolicy;

pub const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    voice_settings: VoiceSettings,
}

/// ElevenLabs text-to-speech over HTTP.
pub struct ElevenLabsBackend {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    default_voice_id: String,
    policy: RetryPolicy,
}

impl ElevenLabsBackend {
    pub fn new(
        api_base: Option<&str>,
        api_key: impl Into<String>,
        default_voice_id: impl Into<String>,
    ) -> Result<Self, ComicError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ComicError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: api_base
                .unwrap_or(ELEVENLABS_API_BASE)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            default_voice_id: default_voice_id.into(),
            policy: RetryPolicy::tts(),
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// `{base}/text-to-speech/{voice_id}` with the id escaped as one segment.
    fn speech_url(&self, voice_id: &str) -> Result<reqwest::Url, ComicError> {
        let mut url = reqwest::Url::parse(&self.api_base)
            .map_err(|e| ComicError::ConfigError(format!("Invalid ElevenLabs API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ComicError::ConfigError(format!("Invalid ElevenLabs API base: {}", self.api_base)))?
            .pop_if_empty()
            .push("text-to-speech")
            .push(voice_id);
        Ok(url)
    }

    async fn request_speech(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ComicError> {
        let url = self.speech_url(voice_id)?;
        let body = SpeechRequest {
            text,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.5,
            },
        };

        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ComicError::TtsCreditsExceeded);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ComicError::UpstreamStatus {
                service: "elevenlabs",
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(ComicError::TtsError("ElevenLabs returned no audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsBackend {
    fn name(&self) -> &'static str {
        "elevenlabs"
    }

    async fn synthesize(
        &self,
        text: &str,
        _lang: Language,
        voice_id: Option<&str>,
    ) -> Result<AudioPayload, ComicError> {
        let voice_id = voice_id
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(&self.default_voice_id);
        if !is_valid_voice_id(voice_id) {
            return Err(ComicError::TtsError(format!("Invalid voice id: {:?}", voice_id)));
        }
        info!(voice_id, text_length = text.len(), "TTS request to ElevenLabs");

        match self
            .policy
            .run("elevenlabs_tts", || self.request_speech(text, voice_id))
            .await
        {
            Ok(bytes) => {
                info!(bytes = bytes.len(), "ElevenLabs TTS successful");
                Ok(AudioPayload::Encoded { bytes })
            }
            Err(e) => {
                error!(voice_id, error = %e, "ElevenLabs TTS failed");
                Err(e)
            }
        }
    }
}
