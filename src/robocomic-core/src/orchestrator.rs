//! Duel orchestration.
//!
//! Drives the round robin between two comedian agents, wraps the whole turn
//! loop in the model retry policy, and degrades to a short fallback
//! transcript instead of returning an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::duel_format::{DuelFormat, DuelMode};
use crate::error::ComicError;
use crate::llm::{ChatMessage, CompletionRequest, LlmBackend};
use crate::participant::{AgentRole, ComedianAgent};
use crate::persona::{Language, PersonaRegistry};
use crate::prompts;
use crate::resilience::RetryPolicy;

/// Parameters of one duel.
#[derive(Debug, Clone, PartialEq)]
pub struct DuelRequest {
    pub comedian1: String,
    pub comedian2: String,
    pub lang: Language,
    pub mode: DuelMode,
    pub topic: Option<String>,
    /// Pre-built context the topical prompt should be grounded in.
    pub context: Option<String>,
    pub rounds: u32,
    pub temperature: Option<f32>,
}

impl DuelRequest {
    pub fn new(comedian1: impl Into<String>, comedian2: impl Into<String>) -> Self {
        Self {
            comedian1: comedian1.into(),
            comedian2: comedian2.into(),
            lang: Language::En,
            mode: DuelMode::Topical,
            topic: None,
            context: None,
            rounds: 1,
            temperature: None,
        }
    }
}

/// One line of a transcript as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    pub role: String,
    pub content: String,
}

impl Utterance {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Outcome of a duel. `success` is false when the fallback transcript was
/// returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelResult {
    pub history: Vec<Utterance>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DuelResult {
    pub fn degraded(lang: Language) -> Self {
        let [notice, first, second] = prompts::fallback_lines(lang);
        Self {
            history: vec![
                Utterance::new("system", notice),
                Utterance::new(AgentRole::First.role_name(), first),
                Utterance::new(AgentRole::Second.role_name(), second),
            ],
            success: false,
            message: Some("The show could not be generated; returning a fallback transcript.".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelState {
    Init,
    AgentsReady,
    PromptBuilt,
    TurnLoop,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    /// Opening prompt and other bookkeeping; never returned to callers.
    Moderator,
    Comedian(AgentRole),
}

#[derive(Debug, Clone)]
struct TranscriptEntry {
    speaker: Speaker,
    content: String,
}

/// Events emitted while a duel runs.
#[derive(Debug, Clone)]
pub enum DuelEvent {
    /// A comedian is about to speak.
    TurnStart { role: String, style: String },
    /// A comedian has spoken.
    Utterance { role: String, content: String },
    /// The turn loop finished.
    DuelEnd,
}

/// Callback for duel events.
pub type DuelCallback = Box<dyn Fn(DuelEvent) + Send + Sync>;

/// Sampling defaults applied when a request leaves them unset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuelDefaults {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for DuelDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            max_tokens: 1000,
        }
    }
}

/// Runs comedy duels. Agents are rebuilt for every duel.
pub struct DuelOrchestrator {
    llm: Arc<dyn LlmBackend>,
    registry: Arc<PersonaRegistry>,
    policy: RetryPolicy,
    defaults: DuelDefaults,
    comedian1_key: String,
    comedian2_key: String,
    lang: Language,
    agents: Option<[ComedianAgent; 2]>,
    state: DuelState,
    callback: Option<DuelCallback>,
}

impl DuelOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmBackend>,
        registry: Arc<PersonaRegistry>,
        policy: RetryPolicy,
        defaults: DuelDefaults,
    ) -> Self {
        Self {
            llm,
            registry,
            policy,
            defaults,
            comedian1_key: String::new(),
            comedian2_key: String::new(),
            lang: Language::En,
            agents: None,
            state: DuelState::Init,
            callback: None,
        }
    }

    /// Set a callback for duel events.
    pub fn with_callback(mut self, callback: DuelCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn state(&self) -> DuelState {
        self.state
    }

    /// Agents of the most recent duel, opener first.
    pub fn agents(&self) -> Option<&[ComedianAgent; 2]> {
        self.agents.as_ref()
    }

    /// Select the two personas and rebuild both agents.
    pub fn set_personas(
        &mut self,
        comedian1_key: &str,
        comedian2_key: &str,
        lang: Option<Language>,
    ) -> Result<(), ComicError> {
        info!(comedian1 = comedian1_key, comedian2 = comedian2_key, lang = %lang.unwrap_or(self.lang), "Setting personas");
        self.comedian1_key = comedian1_key.to_string();
        self.comedian2_key = comedian2_key.to_string();
        if let Some(lang) = lang {
            self.lang = lang;
        }
        self.reset_agents(self.defaults.temperature)
    }

    fn reset_agents(&mut self, temperature: f32) -> Result<(), ComicError> {
        self.agents = None;
        let first = self.registry.get(&self.comedian1_key)?.clone();
        let second = self.registry.get(&self.comedian2_key)?.clone();
        debug!(comedian1 = %first.key, comedian2 = %second.key, temperature, "Resetting agents");

        self.agents = Some([
            ComedianAgent::new(AgentRole::First, first, self.lang, temperature),
            ComedianAgent::new(AgentRole::Second, second, self.lang, temperature),
        ]);
        Ok(())
    }

    /// Run one duel. Never fails: unrecoverable errors produce the fallback
    /// transcript.
    pub async fn run_duel(&mut self, request: &DuelRequest) -> DuelResult {
        info!(
            comedian1 = %request.comedian1,
            comedian2 = %request.comedian2,
            mode = %request.mode,
            topic = request.topic.as_deref().unwrap_or(""),
            rounds = request.rounds,
            lang = %request.lang,
            "Starting duel"
        );
        self.state = DuelState::Init;

        match self.try_run_duel(request).await {
            Ok(history) => {
                self.state = DuelState::Complete;
                info!(messages = history.len(), "Duel completed");
                DuelResult {
                    history,
                    success: true,
                    message: None,
                }
            }
            Err(e) => {
                error!(
                    error = %e,
                    state = ?self.state,
                    comedian1 = %request.comedian1,
                    comedian2 = %request.comedian2,
                    mode = %request.mode,
                    rounds = request.rounds,
                    "Duel failed, returning fallback transcript"
                );
                self.state = DuelState::Failed;
                DuelResult::degraded(request.lang)
            }
        }
    }

    async fn try_run_duel(&mut self, request: &DuelRequest) -> Result<Vec<Utterance>, ComicError> {
        self.comedian1_key = request.comedian1.clone();
        self.comedian2_key = request.comedian2.clone();
        self.lang = request.lang;
        self.reset_agents(request.temperature.unwrap_or(self.defaults.temperature))?;
        self.state = DuelState::AgentsReady;

        let format = DuelFormat::new(request.mode, request.rounds)?;
        let agents = self
            .agents
            .clone()
            .ok_or_else(|| ComicError::ConfigError("Agents were not initialized".to_string()))?;
        let opening = format.opening_prompt(
            &agents[AgentRole::First.index()],
            request.lang,
            request.topic.as_deref(),
            request.context.as_deref(),
        );
        self.state = DuelState::PromptBuilt;
        debug!(prompt = %opening, "Opening prompt built");

        self.state = DuelState::TurnLoop;
        let transcript = self
            .policy
            .run("duel_turn_loop", || self.turn_loop(&agents, &format, &opening))
            .await?;
        self.emit_event(DuelEvent::DuelEnd);

        Ok(transcript
            .into_iter()
            .filter_map(|entry| match entry.speaker {
                Speaker::Comedian(role) => Some(Utterance::new(role.role_name(), entry.content)),
                Speaker::Moderator => None,
            })
            .collect())
    }

    async fn turn_loop(
        &self,
        agents: &[ComedianAgent; 2],
        format: &DuelFormat,
        opening: &str,
    ) -> Result<Vec<TranscriptEntry>, ComicError> {
        let mut transcript = vec![TranscriptEntry {
            speaker: Speaker::Moderator,
            content: opening.to_string(),
        }];

        for role in format.speaker_order() {
            let agent = &agents[role.index()];
            self.emit_event(DuelEvent::TurnStart {
                role: agent.role_name().to_string(),
                style: agent.style().to_string(),
            });

            let request = CompletionRequest::new(conversation_for(agent, &transcript))
                .temperature(agent.temperature)
                .max_tokens(self.defaults.max_tokens);
            let reply = sanitize_response(&self.llm.complete(request).await?);
            if reply.is_empty() {
                return Err(ComicError::EmptyReply(agent.role_name().to_string()));
            }

            debug!(role = agent.role_name(), chars = reply.len(), "Turn completed");
            self.emit_event(DuelEvent::Utterance {
                role: agent.role_name().to_string(),
                content: reply.clone(),
            });
            transcript.push(TranscriptEntry {
                speaker: Speaker::Comedian(role),
                content: reply,
            });
        }

        Ok(transcript)
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: DuelEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

/// Chat history from one agent's point of view: its persona as the system
/// message, its own lines as assistant turns, everything else as user turns.
fn conversation_for(agent: &ComedianAgent, transcript: &[TranscriptEntry]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(ChatMessage::system(agent.system_message()));

    for entry in transcript {
        let message = match entry.speaker {
            Speaker::Comedian(role) if role == agent.role => ChatMessage::assistant(entry.content.clone()),
            Speaker::Comedian(role) => {
                ChatMessage::user(format!("{}: {}", role.role_name(), entry.content))
                    .with_name(role.role_name())
            }
            Speaker::Moderator => ChatMessage::user(entry.content.clone()),
        };
        messages.push(message);
    }

    messages
}

/// Sanitize model output by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <thinking>...</thinking>, <reflection>...</reflection>, etc.
fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratch",
        "scratchpad",
        "plan",
        "analysis",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    if let Ok(orphan_re) = regex::Regex::new(r"</?[\w]+[^>]*>") {
        result = orphan_re.replace_all(&result, "").to_string();
    }

    result = result.replace('*', "");

    if let Ok(ws_re) = regex::Regex::new(r"\s+") {
        result = ws_re.replace_all(&result, " ").to_string();
    }

    result.trim().to_string()
}
