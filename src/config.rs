//! Engine configuration
//!
//! Loaded from JSON. Every field has a default, so `{}` is a valid config.

use crate::analytics::DEFAULT_COHORT_CHUNK_SIZE;
use crate::error::ScoringError;
use crate::recorder::RecorderConfig;
use crate::rules::{ScoringRule, ScoringRuleTable, DEFAULT_BASE_SCORE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base score for event types without a rule
    #[serde(default = "default_base_score")]
    pub default_base_score: i64,

    /// Rules merged over the default table
    #[serde(default)]
    pub rules: BTreeMap<String, ScoringRule>,

    /// Reject events for unknown leads instead of storing them as orphans
    #[serde(default)]
    pub reject_orphan_events: bool,

    #[serde(default = "default_cohort_chunk_size")]
    pub cohort_chunk_size: usize,
}

fn default_base_score() -> i64 {
    DEFAULT_BASE_SCORE
}

fn default_cohort_chunk_size() -> usize {
    DEFAULT_COHORT_CHUNK_SIZE
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_base_score: DEFAULT_BASE_SCORE,
            rules: BTreeMap::new(),
            reject_orphan_events: false,
            cohort_chunk_size: DEFAULT_COHORT_CHUNK_SIZE,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScoringError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ScoringError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.cohort_chunk_size == 0 {
            return Err(ScoringError::Validation(
                "cohort_chunk_size must be at least 1".to_string(),
            ));
        }
        if let Some(key) = self.rules.keys().find(|k| k.trim().is_empty()) {
            return Err(ScoringError::Validation(format!(
                "rule event type must not be blank (got {key:?})"
            )));
        }
        Ok(())
    }

    /// Effective rule table: defaults, then overrides, then the fallback score
    pub fn rule_table(&self) -> ScoringRuleTable {
        ScoringRuleTable::default()
            .with_overrides(self.rules.clone())
            .with_default_base_score(self.default_base_score)
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            reject_orphan_events: self.reject_orphan_events,
        }
    }
}
