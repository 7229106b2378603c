//! Verdicts on finished duels.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ComicError;
use crate::llm::{CompletionRequest, LlmBackend};
use crate::orchestrator::Utterance;
use crate::participant::AgentRole;
use crate::persona::Language;
use crate::prompts;
use crate::resilience::RetryPolicy;

/// Winner display name plus a one-sentence rationale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub winner: String,
    pub summary: String,
}

impl JudgeVerdict {
    /// Verdict used when the model cannot produce a usable one.
    pub fn by_default(winner: &str, lang: Language) -> Self {
        Self {
            winner: winner.to_string(),
            summary: prompts::default_verdict_summary(winner, lang),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    winner: String,
    #[serde(default)]
    summary: String,
}

pub struct Judge {
    llm: Arc<dyn LlmBackend>,
    policy: RetryPolicy,
    temperature: Option<f32>,
}

impl Judge {
    pub fn new(llm: Arc<dyn LlmBackend>, policy: RetryPolicy) -> Self {
        Self {
            llm,
            policy,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Judge a transcript. Never fails; a call or parse failure yields the
    /// default verdict for `comedian1_name`.
    pub async fn judge(
        &self,
        comedian1_name: &str,
        comedian2_name: &str,
        history: &[Utterance],
        lang: Language,
    ) -> JudgeVerdict {
        let history_text = render_history(history, comedian1_name, comedian2_name);
        let prompt = prompts::judging_prompt(comedian1_name, comedian2_name, &history_text, lang);
        let mut request = CompletionRequest::prompt(prompt);
        if let Some(temperature) = self.temperature {
            request = request.temperature(temperature);
        }

        let outcome = self
            .policy
            .run("judge_show", || async {
                let reply = self.llm.complete(request.clone()).await?;
                parse_verdict(&reply, comedian1_name, comedian2_name)
            })
            .await;

        match outcome {
            Ok(verdict) => {
                info!(winner = %verdict.winner, "Show judged");
                verdict
            }
            Err(e) => {
                warn!(
                    error = %e,
                    comedian1 = comedian1_name,
                    comedian2 = comedian2_name,
                    "Judging failed, using default verdict"
                );
                JudgeVerdict::by_default(comedian1_name, lang)
            }
        }
    }
}

/// `speaker: content` lines with role names replaced by display names.
pub fn render_history(history: &[Utterance], comedian1_name: &str, comedian2_name: &str) -> String {
    history
        .iter()
        .map(|u| {
            let speaker = match AgentRole::from_role_name(&u.role) {
                Some(AgentRole::First) => comedian1_name,
                Some(AgentRole::Second) => comedian2_name,
                None => u.role.as_str(),
            };
            format!("{}: {}", speaker, u.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_verdict(
    reply: &str,
    comedian1_name: &str,
    comedian2_name: &str,
) -> Result<JudgeVerdict, ComicError> {
    let json = extract_json(reply)
        .ok_or_else(|| ComicError::MalformedOutput("no JSON object in judge reply".to_string()))?;
    let raw: RawVerdict = serde_json::from_str(json)
        .map_err(|e| ComicError::MalformedOutput(format!("judge reply: {e}")))?;

    let winner = resolve_winner(&raw.winner, comedian1_name, comedian2_name).ok_or_else(|| {
        ComicError::MalformedOutput(format!("'{}' is neither comedian", raw.winner))
    })?;

    Ok(JudgeVerdict {
        winner: winner.to_string(),
        summary: raw.summary.trim().to_string(),
    })
}

/// Body of a ```json fence if present, otherwise the outermost braces.
fn extract_json(reply: &str) -> Option<&str> {
    if let Some(start) = reply.find("```json") {
        let body = &reply[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return Some(body[..end].trim());
        }
    }

    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}

fn resolve_winner<'a>(claimed: &str, comedian1_name: &'a str, comedian2_name: &'a str) -> Option<&'a str> {
    let claimed = claimed.trim();
    let names = [comedian1_name, comedian2_name];

    if let Some(name) = names.into_iter().find(|n| *n == claimed) {
        return Some(name);
    }
    if let Some(name) = names.into_iter().find(|n| n.to_lowercase() == claimed.to_lowercase()) {
        return Some(name);
    }

    let lowered = claimed.to_lowercase();
    let mut contained = names
        .into_iter()
        .filter(|n| !n.is_empty() && lowered.contains(&n.to_lowercase()));
    match (contained.next(), contained.next()) {
        (Some(name), None) => Some(name),
        _ => None,
    }
}
