//! Application service composing the registry, model and speech backends.
//!
//! Every collaborator is passed in explicitly; [`ComedyService::bootstrap`]
//! wires the production backends from [`Settings`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::config::{Settings, TEMPERATURE_PRESETS, TemperaturePreset, TtsBackendKind, VoiceIds};
use crate::error::ComicError;
use crate::judge::{Judge, JudgeVerdict};
use crate::llm::{LlmBackend, OpenAiBackend, generate_topic_context};
use crate::orchestrator::{DuelCallback, DuelDefaults, DuelOrchestrator, DuelRequest, DuelResult, Utterance};
use crate::persona::{Language, PersonaRegistry};
use crate::resilience::RetryPolicy;
use crate::tts::{AudioPayload, ElevenLabsBackend, SpeechBackend};

/// Model settings exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmConfig {
    pub temperature: f32,
    pub model: String,
    pub max_tokens: u32,
}

pub struct ComedyService {
    settings: Arc<Settings>,
    registry: Arc<PersonaRegistry>,
    llm: Arc<dyn LlmBackend>,
    speech: Arc<dyn SpeechBackend>,
    llm_policy: RetryPolicy,
}

impl ComedyService {
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<PersonaRegistry>,
        llm: Arc<dyn LlmBackend>,
        speech: Arc<dyn SpeechBackend>,
    ) -> Self {
        Self {
            settings,
            registry,
            llm,
            speech,
            llm_policy: RetryPolicy::llm(),
        }
    }

    pub fn with_llm_policy(mut self, policy: RetryPolicy) -> Self {
        self.llm_policy = policy;
        self
    }

    /// Build the production service: persona table, OpenAI-compatible
    /// client and the configured speech backend.
    pub async fn bootstrap(settings: Settings) -> Result<Self, ComicError> {
        let registry = match &settings.personas_file {
            Some(path) => PersonaRegistry::load(path)?,
            None => PersonaRegistry::builtin()?,
        };
        info!(personas = registry.len(), "Persona registry loaded");

        let llm = OpenAiBackend::new(
            settings.openai_api_base.as_deref(),
            &settings.openai_api_key,
            settings.llm_model.clone(),
        )?;
        let speech = speech_backend(&settings).await?;
        info!(model = %settings.llm_model, tts = speech.name(), "Backends ready");

        Ok(Self::new(Arc::new(settings), Arc::new(registry), Arc::new(llm), speech))
    }

    /// Run a duel, optionally grounding it in freshly generated topic
    /// context. Never fails; see [`DuelOrchestrator::run_duel`].
    pub async fn generate_show(&self, request: DuelRequest, build_context: bool) -> DuelResult {
        self.generate_show_with(request, build_context, None).await
    }

    /// [`generate_show`](Self::generate_show) with a callback for duel events.
    pub async fn generate_show_with(
        &self,
        mut request: DuelRequest,
        build_context: bool,
        callback: Option<DuelCallback>,
    ) -> DuelResult {
        info!(
            comedian1 = %request.comedian1,
            comedian2 = %request.comedian2,
            mode = %request.mode,
            rounds = request.rounds,
            temperature = ?request.temperature,
            "Generating show"
        );

        let has_context = request.context.as_deref().is_some_and(|c| !c.trim().is_empty());
        let topic = request.topic.clone().unwrap_or_default();
        if build_context && !has_context && !topic.trim().is_empty() {
            info!(topic = %topic, "Generating topic context");
            let context = generate_topic_context(
                self.llm.as_ref(),
                &self.llm_policy,
                &topic,
                request.lang,
                self.settings.default_temperature,
                self.settings.default_max_tokens,
            )
            .await;
            request.context = Some(context);
        }

        let mut orchestrator = DuelOrchestrator::new(
            self.llm.clone(),
            self.registry.clone(),
            self.llm_policy.clone(),
            self.duel_defaults(),
        );
        if let Some(callback) = callback {
            orchestrator = orchestrator.with_callback(callback);
        }
        orchestrator.run_duel(&request).await
    }

    pub async fn judge_show(
        &self,
        comedian1_name: &str,
        comedian2_name: &str,
        history: &[Utterance],
        lang: Language,
    ) -> JudgeVerdict {
        info!(comedian1 = comedian1_name, comedian2 = comedian2_name, messages = history.len(), "Judging show");
        Judge::new(self.llm.clone(), self.llm_policy.clone())
            .with_temperature(self.settings.default_temperature)
            .judge(comedian1_name, comedian2_name, history, lang)
            .await
    }

    /// Synthesize one line. Credit exhaustion is reported as such; every
    /// other failure becomes [`ComicError::TtsError`].
    pub async fn tts(
        &self,
        text: &str,
        lang: Language,
        voice_id: Option<&str>,
    ) -> Result<AudioPayload, ComicError> {
        info!(chars = text.chars().count(), lang = %lang, voice_id = ?voice_id, "TTS request");
        match self.speech.synthesize(text, lang, voice_id).await {
            Ok(payload) => Ok(payload),
            Err(ComicError::TtsCreditsExceeded) => {
                error!("TTS service unavailable: out of credits or invalid API key");
                Err(ComicError::TtsCreditsExceeded)
            }
            Err(ComicError::TtsError(message)) => {
                error!(error = %message, "TTS generation failed");
                Err(ComicError::TtsError(message))
            }
            Err(e) => {
                error!(error = %e, "TTS generation failed");
                Err(ComicError::TtsError(e.to_string()))
            }
        }
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn voice_ids(&self) -> &VoiceIds {
        &self.settings.voice_ids
    }

    pub fn llm_config(&self) -> LlmConfig {
        LlmConfig {
            temperature: self.settings.default_temperature,
            model: self.llm.model().to_string(),
            max_tokens: self.settings.default_max_tokens,
        }
    }

    pub fn temperature_presets(&self) -> &'static [TemperaturePreset] {
        &TEMPERATURE_PRESETS
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn duel_defaults(&self) -> DuelDefaults {
        DuelDefaults {
            temperature: self.settings.default_temperature,
            max_tokens: self.settings.default_max_tokens,
        }
    }
}

async fn speech_backend(settings: &Settings) -> Result<Arc<dyn SpeechBackend>, ComicError> {
    match settings.tts_backend {
        TtsBackendKind::ElevenLabs => Ok(Arc::new(ElevenLabsBackend::new(
            settings.elevenlabs_api_base.as_deref(),
            settings.elevenlabs_api_key.clone(),
            settings.voice_ids.comedian1_voice_id.clone(),
        )?)),
        #[cfg(feature = "kokoro")]
        TtsBackendKind::Kokoro => Ok(Arc::new(
            crate::tts::KokoroBackend::new(settings.voice_ids.comedian1_voice_id.clone()).await?,
        )),
        #[cfg(not(feature = "kokoro"))]
        TtsBackendKind::Kokoro => Err(ComicError::ConfigError(
            "TTS_BACKEND=kokoro requires building with the 'kokoro' feature".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedLlm;
    use async_trait::async_trait;

    struct FailingSpeech(fn() -> ComicError);

    #[async_trait]
    impl SpeechBackend for FailingSpeech {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn synthesize(&self, _: &str, _: Language, _: Option<&str>) -> Result<AudioPayload, ComicError> {
            Err((self.0)())
        }
    }

    fn settings() -> Settings {
        Settings::from_lookup(|key| {
            let value = match key {
                "OPENAI_API_KEY" => "sk-test",
                "ELEVENLABS_API_KEY" => "xi-test",
                "COMEDIAN1_VOICE_ID" => "voice-1",
                "COMEDIAN2_VOICE_ID" => "voice-2",
                "DEFAULT_TEMPERATURE" => "0.7",
                _ => return None,
            };
            Some(value.to_string())
        })
        .unwrap()
    }

    fn service(llm: Arc<ScriptedLlm>, speech: FailingSpeech) -> ComedyService {
        ComedyService::new(
            Arc::new(settings()),
            Arc::new(PersonaRegistry::builtin().unwrap()),
            llm,
            Arc::new(speech),
        )
    }

    fn credits() -> ComicError {
        ComicError::TtsCreditsExceeded
    }

    fn bad_gateway() -> ComicError {
        ComicError::UpstreamStatus {
            service: "elevenlabs",
            status: 502,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn test_build_context_feeds_topical_prompt() {
        let mut replies = vec!["Planes are late. Food is bad.".to_string()];
        replies.extend((0..4).map(|i| format!("Joke {i}")));
        let llm = Arc::new(ScriptedLlm::new(replies));
        let svc = service(llm.clone(), FailingSpeech(credits));

        let request = DuelRequest {
            topic: Some("airplanes".to_string()),
            ..DuelRequest::new("sarcastic", "absurd")
        };
        let result = svc.generate_show(request, true).await;

        assert!(result.success);
        assert_eq!(result.history.len(), 4);
        let opening = &llm.requests()[1].messages[1].content;
        assert!(opening.contains("at least 90%"));
        assert!(opening.contains("Planes are late.\nFood is bad."));
        assert_eq!(llm.requests()[1].temperature, Some(0.7));
    }

    #[tokio::test]
    async fn test_supplied_context_skips_generation() {
        let llm = Arc::new(ScriptedLlm::new((0..4).map(|i| format!("Joke {i}"))));
        let svc = service(llm.clone(), FailingSpeech(credits));

        let request = DuelRequest {
            topic: Some("airplanes".to_string()),
            context: Some("Pilots nap.".to_string()),
            ..DuelRequest::new("sarcastic", "absurd")
        };
        let result = svc.generate_show(request, true).await;

        assert!(result.success);
        assert_eq!(llm.call_count(), 4);
    }

    #[tokio::test]
    async fn test_tts_error_mapping() {
        let svc = service(Arc::new(ScriptedLlm::failing()), FailingSpeech(credits));
        assert!(matches!(
            svc.tts("hi", Language::En, None).await,
            Err(ComicError::TtsCreditsExceeded)
        ));

        let svc = service(Arc::new(ScriptedLlm::failing()), FailingSpeech(bad_gateway));
        match svc.tts("hi", Language::En, None).await {
            Err(ComicError::TtsError(message)) => assert!(message.contains("502")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_llm_config_reports_model() {
        let svc = service(Arc::new(ScriptedLlm::failing()), FailingSpeech(credits));
        let config = svc.llm_config();
        assert_eq!(config.model, "scripted");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(svc.temperature_presets().len(), 4);
    }

    #[tokio::test]
    async fn test_kokoro_without_feature_is_config_error() {
        let mut settings = settings();
        settings.tts_backend = TtsBackendKind::Kokoro;
        if cfg!(not(feature = "kokoro")) {
            assert!(matches!(
                speech_backend(&settings).await,
                Err(ComicError::ConfigError(_))
            ));
        }
    }
}
