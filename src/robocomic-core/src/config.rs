//! Runtime settings read from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ComicError;
use crate::participant::AgentRole;
use crate::persona::Language;

/// Named sampling temperature offered to clients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperaturePreset {
    pub name: &'static str,
    pub temperature: f32,
}

pub const TEMPERATURE_PRESETS: [TemperaturePreset; 4] = [
    TemperaturePreset {
        name: "conservative",
        temperature: 0.3,
    },
    TemperaturePreset {
        name: "balanced",
        temperature: 0.7,
    },
    TemperaturePreset {
        name: "creative",
        temperature: 0.9,
    },
    TemperaturePreset {
        name: "experimental",
        temperature: 1.0,
    },
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Human,
}

impl FromStr for LogFormat {
    type Err = ComicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "human" => Ok(LogFormat::Human),
            other => Err(ComicError::ConfigError(format!(
                "LOG_FORMAT must be 'json' or 'human', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TtsBackendKind {
    #[default]
    ElevenLabs,
    Kokoro,
}

impl fmt::Display for TtsBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtsBackendKind::ElevenLabs => f.write_str("elevenlabs"),
            TtsBackendKind::Kokoro => f.write_str("kokoro"),
        }
    }
}

impl FromStr for TtsBackendKind {
    type Err = ComicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "elevenlabs" => Ok(TtsBackendKind::ElevenLabs),
            "kokoro" => Ok(TtsBackendKind::Kokoro),
            other => Err(ComicError::ConfigError(format!(
                "TTS_BACKEND must be 'elevenlabs' or 'kokoro', got '{other}'"
            ))),
        }
    }
}

/// Voice assigned to each comedian seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceIds {
    pub comedian1_voice_id: String,
    pub comedian2_voice_id: String,
}

impl VoiceIds {
    pub fn for_role(&self, role: AgentRole) -> &str {
        match role {
            AgentRole::First => &self.comedian1_voice_id,
            AgentRole::Second => &self.comedian2_voice_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub openai_api_key: String,
    pub openai_api_base: Option<String>,
    pub elevenlabs_api_key: String,
    pub elevenlabs_api_base: Option<String>,
    pub voice_ids: VoiceIds,
    pub llm_model: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
    pub default_lang: Language,
    pub api_host: String,
    pub api_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub tts_backend: TtsBackendKind,
    /// Empty means any origin.
    pub cors_origins: Vec<String>,
    pub personas_file: Option<PathBuf>,
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ComicError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ComicError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                ComicError::ConfigError(format!("Missing required environment variable: {key}"))
            })
        };

        let tts_backend = get("TTS_BACKEND")
            .map(|v| v.parse::<TtsBackendKind>())
            .transpose()?
            .unwrap_or_default();

        // Only the ElevenLabs backend needs its key.
        let elevenlabs_api_key = match tts_backend {
            TtsBackendKind::ElevenLabs => required("ELEVENLABS_API_KEY")?,
            TtsBackendKind::Kokoro => get("ELEVENLABS_API_KEY").unwrap_or_default(),
        };

        let default_temperature = parse_or("DEFAULT_TEMPERATURE", get("DEFAULT_TEMPERATURE"), 0.9_f32)?;
        if !(0.0..=2.0).contains(&default_temperature) {
            return Err(ComicError::ConfigError(format!(
                "DEFAULT_TEMPERATURE must be between 0.0 and 2.0, got {default_temperature}"
            )));
        }

        let default_max_tokens = parse_or("DEFAULT_MAX_TOKENS", get("DEFAULT_MAX_TOKENS"), 1000_u32)?;
        if default_max_tokens == 0 {
            return Err(ComicError::ConfigError(
                "DEFAULT_MAX_TOKENS must be greater than 0".to_string(),
            ));
        }

        let api_port = parse_or("API_PORT", get("API_PORT"), 8000_u16)?;
        if api_port == 0 {
            return Err(ComicError::ConfigError("API_PORT must be between 1 and 65535".to_string()));
        }

        Ok(Self {
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_api_base: get("OPENAI_API_BASE").or_else(|| get("OPENAI_BASE_URL")),
            elevenlabs_api_key,
            elevenlabs_api_base: get("ELEVENLABS_API_BASE"),
            voice_ids: VoiceIds {
                comedian1_voice_id: required("COMEDIAN1_VOICE_ID")?,
                comedian2_voice_id: required("COMEDIAN2_VOICE_ID")?,
            },
            llm_model: get("LLM_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            default_temperature,
            default_max_tokens,
            default_lang: get("DEFAULT_LANG")
                .map(|v| v.parse::<Language>())
                .transpose()?
                .unwrap_or_default(),
            api_host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            api_port,
            log_level: get("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            log_format: get("LOG_FORMAT")
                .map(|v| v.parse::<LogFormat>())
                .transpose()?
                .unwrap_or_default(),
            tts_backend,
            cors_origins: get("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty() && *o != "*")
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            personas_file: get("PERSONAS_FILE").map(PathBuf::from),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T, ComicError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| ComicError::ConfigError(format!("Invalid value for {key} ('{raw}'): {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut vars: HashMap<String, String> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("ELEVENLABS_API_KEY", "xi-test"),
            ("COMEDIAN1_VOICE_ID", "voice-1"),
            ("COMEDIAN2_VOICE_ID", "voice-2"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.llm_model, "gpt-3.5-turbo");
        assert_eq!(settings.default_temperature, 0.9);
        assert_eq!(settings.default_max_tokens, 1000);
        assert_eq!(settings.default_lang, Language::En);
        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.tts_backend, TtsBackendKind::ElevenLabs);
        assert!(settings.cors_origins.is_empty());
        assert_eq!(settings.voice_ids.for_role(AgentRole::Second), "voice-2");
    }

    #[test]
    fn test_missing_required_key() {
        let err = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_kokoro_does_not_need_elevenlabs_key() {
        let settings =
            Settings::from_lookup(lookup(&[("TTS_BACKEND", "kokoro"), ("ELEVENLABS_API_KEY", "")])).unwrap();
        assert_eq!(settings.tts_backend, TtsBackendKind::Kokoro);
        assert!(settings.elevenlabs_api_key.is_empty());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::from_lookup(lookup(&[("API_PORT", "0")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("API_PORT", "http")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("DEFAULT_TEMPERATURE", "3.5")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("LOG_FORMAT", "xml")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("DEFAULT_LANG", "de")])).is_err());
        assert!(Settings::from_lookup(lookup(&[("TTS_BACKEND", "bark")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            ("LLM_MODEL", "gpt-4o-mini"),
            ("DEFAULT_LANG", "PL"),
            ("LOG_FORMAT", "human"),
            ("LOG_LEVEL", "DEBUG"),
            ("CORS_ORIGINS", "http://localhost:3000, https://robocomic.app,"),
            ("OPENAI_BASE_URL", "http://localhost:11434/v1"),
        ]))
        .unwrap();
        assert_eq!(settings.llm_model, "gpt-4o-mini");
        assert_eq!(settings.default_lang, Language::Pl);
        assert_eq!(settings.log_format, LogFormat::Human);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.cors_origins, ["http://localhost:3000", "https://robocomic.app"]);
        assert_eq!(settings.openai_api_base.as_deref(), Some("http://localhost:11434/v1"));
    }

    #[test]
    fn test_presets_are_ordered() {
        let names: Vec<&str> = TEMPERATURE_PRESETS.iter().map(|p| p.name).collect();
        assert_eq!(names, ["conservative", "balanced", "creative", "experimental"]);
        assert!(TEMPERATURE_PRESETS.windows(2).all(|w| w[0].temperature < w[1].temperature));
    }
}
