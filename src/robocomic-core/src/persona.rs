//! Comedian personas and the registry they are loaded into.
//!
//! The registry is read once at startup, from the embedded table or a TOML
//! file with the same layout, and never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::ComicError;

const BUILTIN_PERSONAS: &str = include_str!("../data/personas.toml");

/// Language a duel is performed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Pl,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Pl => "pl",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ComicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Language::En),
            "pl" => Ok(Language::Pl),
            other => Err(ComicError::ConfigError(format!(
                "Unsupported language '{other}'. Expected one of: en, pl"
            ))),
        }
    }
}

/// A named comedic style with a bilingual description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Persona {
    #[serde(skip)]
    pub key: String,
    pub name: String,
    pub style: String,
    pub description: String,
    pub description_pl: String,
}

impl Persona {
    pub fn description_for(&self, lang: Language) -> &str {
        match lang {
            Language::En => &self.description,
            Language::Pl => &self.description_pl,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PersonaFile {
    personas: BTreeMap<String, PersonaEntry>,
}

#[derive(Debug, Deserialize)]
struct PersonaEntry {
    name: String,
    #[serde(default)]
    style: Option<String>,
    description: String,
    description_pl: String,
}

/// Read-only persona table keyed by style identifier.
#[derive(Debug, Clone)]
pub struct PersonaRegistry {
    personas: BTreeMap<String, Persona>,
}

impl PersonaRegistry {
    /// The persona table shipped with the crate.
    pub fn builtin() -> Result<Self, ComicError> {
        Self::from_toml_str(BUILTIN_PERSONAS)
    }

    /// Load a persona table from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ComicError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ComicError::ConfigError(format!(
                "Failed to read personas file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ComicError> {
        let file: PersonaFile = toml::from_str(content)
            .map_err(|e| ComicError::ConfigError(format!("Failed to parse personas: {}", e)))?;

        if file.personas.is_empty() {
            return Err(ComicError::ConfigError(
                "Persona table must define at least one persona".to_string(),
            ));
        }

        let mut personas = BTreeMap::new();
        for (key, entry) in file.personas {
            if entry.name.trim().is_empty() || entry.description.trim().is_empty() {
                return Err(ComicError::ConfigError(format!(
                    "Persona '{key}' needs a name and a description"
                )));
            }
            let persona = Persona {
                style: entry.style.unwrap_or_else(|| key.clone()),
                key: key.clone(),
                name: entry.name,
                description: entry.description,
                description_pl: entry.description_pl,
            };
            personas.insert(key, persona);
        }

        Ok(Self { personas })
    }

    pub fn get(&self, key: &str) -> Result<&Persona, ComicError> {
        self.personas
            .get(key)
            .ok_or_else(|| ComicError::UnknownPersona(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.personas.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.personas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Persona)> {
        self.personas.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
