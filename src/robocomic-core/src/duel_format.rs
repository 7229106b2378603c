//! Duel format: mode, round bound and turn schedule.
//!
//! A duel is a strict round robin between two comedians. Each round has two
//! exchange legs per comedian, so a duel of `rounds` rounds runs
//! `rounds * TURNS_PER_ROUND` model turns.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ComicError;
use crate::participant::{AgentRole, ComedianAgent};
use crate::persona::Language;
use crate::prompts;

pub const MIN_ROUNDS: u32 = 1;
pub const MAX_ROUNDS: u32 = 10;
pub const TURNS_PER_ROUND: usize = 4;

/// Kind of comedy performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuelMode {
    /// A bit about a topic, optionally grounded in supplied context.
    #[default]
    Topical,
    /// The comedians insult each other; the topic is ignored.
    Roast,
}

impl DuelMode {
    pub fn name(&self) -> &'static str {
        match self {
            DuelMode::Topical => "topical",
            DuelMode::Roast => "roast",
        }
    }

    /// Word limit written into the opening prompt. Advisory only.
    pub fn word_limit(&self) -> u32 {
        match self {
            DuelMode::Topical => 50,
            DuelMode::Roast => 30,
        }
    }
}

impl fmt::Display for DuelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DuelMode {
    type Err = ComicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "topical" => Ok(DuelMode::Topical),
            "roast" => Ok(DuelMode::Roast),
            other => Err(ComicError::ConfigError(format!(
                "Unknown duel mode '{other}'. Expected one of: topical, roast"
            ))),
        }
    }
}

/// Mode plus a validated round count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuelFormat {
    mode: DuelMode,
    rounds: u32,
}

impl DuelFormat {
    pub fn new(mode: DuelMode, rounds: u32) -> Result<Self, ComicError> {
        if !(MIN_ROUNDS..=MAX_ROUNDS).contains(&rounds) {
            return Err(ComicError::InvalidRoundCount {
                min: MIN_ROUNDS,
                max: MAX_ROUNDS,
                actual: rounds,
            });
        }
        Ok(Self { mode, rounds })
    }

    pub fn mode(&self) -> DuelMode {
        self.mode
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn total_turns(&self) -> usize {
        self.rounds as usize * TURNS_PER_ROUND
    }

    /// Speaking order for the whole duel, opener first.
    pub fn speaker_order(&self) -> Vec<AgentRole> {
        (0..self.total_turns())
            .map(|turn| AgentRole::ALL[turn % AgentRole::ALL.len()])
            .collect()
    }

    /// Prompt that opens the duel, addressed to the opening comedian.
    pub fn opening_prompt(
        &self,
        opener: &ComedianAgent,
        lang: Language,
        topic: Option<&str>,
        context: Option<&str>,
    ) -> String {
        let topic = topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| prompts::default_topic(lang));
        let context = context.map(str::trim).filter(|c| !c.is_empty());

        let template = match (self.mode, context.is_some(), lang) {
            (DuelMode::Topical, true, Language::En) => prompts::TOPICAL_WITH_CONTEXT_EN,
            (DuelMode::Topical, true, Language::Pl) => prompts::TOPICAL_WITH_CONTEXT_PL,
            (DuelMode::Topical, false, Language::En) => prompts::TOPICAL_EN,
            (DuelMode::Topical, false, Language::Pl) => prompts::TOPICAL_PL,
            (DuelMode::Roast, _, Language::En) => prompts::ROAST_EN,
            (DuelMode::Roast, _, Language::Pl) => prompts::ROAST_PL,
        };

        prompts::fill(
            template,
            &[
                ("name", opener.role_name()),
                ("style", opener.style()),
                ("topic", topic),
                ("context", context.unwrap_or_default()),
            ],
        )
    }
}
