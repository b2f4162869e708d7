//! Scoring rule table
//!
//! Static mapping from event type to base score and category. The table is an
//! immutable value handed to the calculator at construction time, so per-tenant
//! overrides are just another table.

use crate::error::ScoringError;
use crate::types::EventCategory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Base score used for event types missing from the table
pub const DEFAULT_BASE_SCORE: i64 = 5;

/// Base score and category for one event type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRule {
    pub base_score: i64,
    pub category: EventCategory,
}

impl ScoringRule {
    pub fn new(base_score: i64, category: EventCategory) -> Self {
        Self {
            base_score,
            category,
        }
    }
}

/// Immutable event-type -> rule mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRuleTable {
    rules: BTreeMap<String, ScoringRule>,
    #[serde(default = "default_base_score")]
    default_base_score: i64,
}

fn default_base_score() -> i64 {
    DEFAULT_BASE_SCORE
}

impl Default for ScoringRuleTable {
    fn default() -> Self {
        use EventCategory::*;

        let entries: [(&str, i64, EventCategory); 17] = [
            ("page_view", 1, Engagement),
            ("email_open", 3, Engagement),
            ("email_click", 5, Engagement),
            ("content_download", 8, Engagement),
            ("lead_capture", 10, Engagement),
            ("assessment_start", 15, Assessment),
            ("question_answered", 5, Assessment),
            ("assessment_complete", 25, Assessment),
            ("results_viewed", 10, Assessment),
            ("pricing_viewed", 20, Intent),
            ("demo_requested", 40, Intent),
            ("consultation_booked", 40, Intent),
            ("trial_signup", 50, Conversion),
            ("purchase", 100, Conversion),
            ("referral_sent", 30, Advocacy),
            ("email_unsubscribe", -20, Disengagement),
            ("email_bounce", -5, Disengagement),
        ];

        let rules = entries
            .into_iter()
            .map(|(event_type, base, category)| {
                (event_type.to_string(), ScoringRule::new(base, category))
            })
            .collect();

        Self {
            rules,
            default_base_score: DEFAULT_BASE_SCORE,
        }
    }
}

impl ScoringRuleTable {
    /// An empty table; every lookup falls back to `default_base_score`
    pub fn empty(default_base_score: i64) -> Self {
        Self {
            rules: BTreeMap::new(),
            default_base_score,
        }
    }

    /// Return a copy of this table with `overrides` replacing or adding rules
    pub fn with_overrides<I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, ScoringRule)>,
    {
        let mut rules = self.rules.clone();
        rules.extend(overrides);
        Self {
            rules,
            default_base_score: self.default_base_score,
        }
    }

    /// Return a copy of this table with a different fallback base score
    pub fn with_default_base_score(&self, default_base_score: i64) -> Self {
        Self {
            rules: self.rules.clone(),
            default_base_score,
        }
    }

    pub fn get(&self, event_type: &str) -> Option<&ScoringRule> {
        self.rules.get(event_type)
    }

    /// Base score for `event_type`, falling back to the table default
    pub fn base_score(&self, event_type: &str) -> i64 {
        self.rules
            .get(event_type)
            .map(|rule| rule.base_score)
            .unwrap_or(self.default_base_score)
    }

    pub fn default_base_score(&self) -> i64 {
        self.default_base_score
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScoringRule)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Load a table from JSON
    pub fn from_json(json: &str) -> Result<Self, ScoringError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the table to JSON
    pub fn to_json(&self) -> Result<String, ScoringError> {
        Ok(serde_json::to_string(self)?)
    }
}
