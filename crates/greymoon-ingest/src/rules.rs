//! Keyword lists that drive scoring and the relevance gate, loadable from YAML.

use std::path::Path;

use anyhow::{Context, Result};
use greymoon_core::ScoringRules;
use serde::Deserialize;

pub const DEFAULT_SERVICE_KEYWORDS: &[&str] = &[
    "clean",
    "maid",
    "janitor",
    "plumb",
    "leak",
    "drain",
    "electric",
    "wiring",
    "junk",
    "haul",
    "trash",
    "waste",
    "dumpster",
    "removal",
    "handyman",
    "repair",
    "landscap",
    "lawn",
    "yard",
    "tree",
    "moving",
    "movers",
    "paint",
    "roof",
    "gutter",
    "hvac",
    "heating",
    "air condition",
    "pressure wash",
    "carpet",
    "window",
    "pest",
];

#[derive(Debug, Clone, Deserialize)]
struct RulesFile {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    premium_categories: Option<Vec<String>>,
    #[serde(default)]
    urgency_keywords: Option<Vec<String>>,
    #[serde(default)]
    service_keywords: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestRules {
    pub scoring: ScoringRules,
    pub service_keywords: Vec<String>,
}

impl Default for IngestRules {
    fn default() -> Self {
        Self {
            scoring: ScoringRules::default(),
            service_keywords: DEFAULT_SERVICE_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl IngestRules {
    /// Parse a rules document; lists it leaves out keep their built-in values.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let file: RulesFile = serde_yaml::from_str(text).context("parsing rules yaml")?;
        let mut rules = Self::default();
        if let Some(premium) = file.premium_categories {
            rules.scoring.premium_categories = premium;
        }
        if let Some(urgency) = file.urgency_keywords {
            rules.scoring.urgency_keywords = urgency;
        }
        if let Some(service) = file.service_keywords {
            rules.service_keywords = service;
        }
        Ok(rules)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("loading {}", path.display()))
    }

    /// Rules from `path` when given, built-in defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
