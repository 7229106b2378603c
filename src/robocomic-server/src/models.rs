//! Wire types for the HTTP API and their validation.
//!
//! Requests deserialize leniently and are checked by `validate`, which
//! reports every bad field at once.

use std::collections::BTreeMap;

use robocomic_core::{DuelMode, DuelRequest, Language, MAX_ROUNDS, MIN_ROUNDS, Persona, PersonaRegistry, Utterance};
use robocomic_core::tts::is_valid_voice_id;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MAX_TOPIC_CHARS: usize = 500;
pub const MAX_TTS_CHARS: usize = 1000;

/// One entry of a validation error report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub loc: Vec<String>,
    pub msg: String,
    pub input: Value,
}

impl FieldError {
    pub fn new(kind: &'static str, field: &str, msg: impl Into<String>, input: impl Into<Value>) -> Self {
        Self {
            kind,
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            input: input.into(),
        }
    }
}

fn default_rounds() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateShowRequest {
    pub comedian1_style: String,
    pub comedian2_style: String,
    #[serde(default)]
    pub lang: Language,
    #[serde(default)]
    pub mode: DuelMode,
    #[serde(default)]
    pub topic: String,
    #[serde(default = "default_rounds")]
    pub num_rounds: i64,
    #[serde(default)]
    pub build_context: bool,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl GenerateShowRequest {
    /// Check the request against the persona table. Returns the duel to run
    /// and whether topic context should be generated.
    pub fn validate(self, registry: &PersonaRegistry) -> Result<(DuelRequest, bool), Vec<FieldError>> {
        let mut errors = Vec::new();

        for (field, style) in [
            ("comedian1_style", &self.comedian1_style),
            ("comedian2_style", &self.comedian2_style),
        ] {
            if !registry.contains(style) {
                let valid: Vec<&str> = registry.keys().collect();
                errors.push(FieldError::new(
                    "value_error",
                    field,
                    format!("Invalid comedian style \"{}\". Must be one of: {}", style, valid.join(", ")),
                    style.as_str(),
                ));
            }
        }

        if self.topic.chars().count() > MAX_TOPIC_CHARS {
            errors.push(FieldError::new(
                "value_error",
                "topic",
                format!("Topic too long (max {MAX_TOPIC_CHARS} characters)"),
                self.topic.as_str(),
            ));
        }

        let rounds = u32::try_from(self.num_rounds)
            .ok()
            .filter(|r| (MIN_ROUNDS..=MAX_ROUNDS).contains(r));
        if rounds.is_none() {
            errors.push(FieldError::new(
                "range_error",
                "num_rounds",
                format!("Number of rounds must be between {MIN_ROUNDS} and {MAX_ROUNDS}"),
                self.num_rounds,
            ));
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                errors.push(FieldError::new(
                    "range_error",
                    "temperature",
                    "Temperature must be between 0.0 and 1.0",
                    temperature,
                ));
            }
        }

        match rounds {
            Some(rounds) if errors.is_empty() => {
                let topic = self.topic.trim();
                let request = DuelRequest {
                    comedian1: self.comedian1_style,
                    comedian2: self.comedian2_style,
                    lang: self.lang,
                    mode: self.mode,
                    topic: (!topic.is_empty()).then(|| topic.to_string()),
                    context: self.context.filter(|c| !c.trim().is_empty()),
                    rounds,
                    temperature: self.temperature,
                };
                Ok((request, self.build_context))
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JudgeShowRequest {
    pub comedian1_name: String,
    pub comedian2_name: String,
    pub history: Vec<Utterance>,
    #[serde(default)]
    pub lang: Language,
}

impl JudgeShowRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        for (field, name) in [
            ("comedian1_name", &self.comedian1_name),
            ("comedian2_name", &self.comedian2_name),
        ] {
            if name.trim().is_empty() {
                errors.push(FieldError::new("value_error", field, "Name cannot be empty", name.as_str()));
            }
        }
        if self.history.is_empty() {
            errors.push(FieldError::new(
                "value_error",
                "history",
                "History cannot be empty",
                Value::Array(Vec::new()),
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default)]
    pub lang: Language,
    #[serde(default)]
    pub voice_id: Option<String>,
}

impl TtsRequest {
    /// Trimmed text to synthesize.
    pub fn validate(&self) -> Result<String, Vec<FieldError>> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(vec![FieldError::new(
                "value_error",
                "text",
                "Text cannot be empty",
                self.text.as_str(),
            )]);
        }
        if self.text.chars().count() > MAX_TTS_CHARS {
            return Err(vec![FieldError::new(
                "value_error",
                "text",
                format!("Text too long (max {MAX_TTS_CHARS} characters)"),
                self.text.as_str(),
            )]);
        }
        if let Some(voice_id) = self.voice_id.as_deref().map(str::trim) {
            if !voice_id.is_empty() && !is_valid_voice_id(voice_id) {
                return Err(vec![FieldError::new(
                    "value_error",
                    "voice_id",
                    "Voice id may only contain letters, digits, '_' and '-'",
                    voice_id,
                )]);
            }
        }
        Ok(text.to_string())
    }
}

#[derive(Debug, Serialize)]
pub struct PersonasResponse {
    pub personas: BTreeMap<String, Persona>,
}

impl PersonasResponse {
    pub fn from_registry(registry: &PersonaRegistry) -> Self {
        Self {
            personas: registry
                .iter()
                .map(|(key, persona)| (key.to_string(), persona.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}
