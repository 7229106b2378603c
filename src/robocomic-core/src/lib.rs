//! RoboComic core library
//!
//! Comedy duel orchestration between two AI personas, judging, retry
//! policies and speech synthesis backends.

pub mod config;
pub mod duel_format;
pub mod error;
pub mod judge;
pub mod llm;
pub mod orchestrator;
pub mod participant;
pub mod persona;
pub mod prompts;
pub mod resilience;
pub mod service;
pub mod tts;

#[cfg(test)]
mod test_support;

pub use config::{LogFormat, Settings, TEMPERATURE_PRESETS, TemperaturePreset, TtsBackendKind, VoiceIds};
pub use duel_format::{DuelFormat, DuelMode, MAX_ROUNDS, MIN_ROUNDS};
pub use error::{ComicError, FailureClass};
pub use judge::{Judge, JudgeVerdict};
pub use llm::{ChatMessage, ChatRole, CompletionRequest, LlmBackend, OpenAiBackend};
pub use orchestrator::{
    DuelCallback, DuelDefaults, DuelEvent, DuelOrchestrator, DuelRequest, DuelResult, DuelState, Utterance,
};
pub use participant::{AgentRole, ComedianAgent};
pub use persona::{Language, Persona, PersonaRegistry};
pub use resilience::{RetryOn, RetryPolicy};
pub use service::{ComedyService, LlmConfig};
pub use tts::{AudioPayload, SpeechBackend};
