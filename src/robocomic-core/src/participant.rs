//! Comedian agents.
//!
//! An agent is a persona bound to one of the two conversational roles for a
//! single duel.

use serde::{Deserialize, Serialize};

use crate::persona::{Language, Persona};

/// Seat of a comedian in the duel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AgentRole {
    /// Opens the duel.
    #[serde(rename = "Comedian_1")]
    First,
    /// Answers the opener.
    #[serde(rename = "Comedian_2")]
    Second,
}

impl AgentRole {
    pub const ALL: [AgentRole; 2] = [AgentRole::First, AgentRole::Second];

    pub fn role_name(&self) -> &'static str {
        match self {
            AgentRole::First => "Comedian_1",
            AgentRole::Second => "Comedian_2",
        }
    }

    pub fn from_role_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|role| role.role_name() == name)
    }

    pub fn index(&self) -> usize {
        match self {
            AgentRole::First => 0,
            AgentRole::Second => 1,
        }
    }

    pub fn opponent(&self) -> Self {
        match self {
            AgentRole::First => AgentRole::Second,
            AgentRole::Second => AgentRole::First,
        }
    }
}

/// A persona performing in one seat of one duel.
#[derive(Debug, Clone)]
pub struct ComedianAgent {
    pub role: AgentRole,
    pub persona: Persona,
    pub lang: Language,
    /// Sampling temperature for this agent's completions.
    pub temperature: f32,
}

impl ComedianAgent {
    pub fn new(role: AgentRole, persona: Persona, lang: Language, temperature: f32) -> Self {
        Self {
            role,
            persona,
            lang,
            temperature,
        }
    }

    pub fn role_name(&self) -> &'static str {
        self.role.role_name()
    }

    pub fn style(&self) -> &str {
        &self.persona.style
    }

    pub fn system_message(&self) -> String {
        format!(
            "You are {}, a {} comedian. {}",
            self.role_name(),
            self.style(),
            self.persona.description_for(self.lang)
        )
    }
}
