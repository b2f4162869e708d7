//! Event score calculation
//!
//! Turns an event type plus its recognised metadata modifiers into a single
//! integer score impact.

use crate::rules::ScoringRuleTable;
use crate::types::EventMetadata;
use serde::{Deserialize, Serialize};

/// Time spent above which an interaction counts as deliberate
const LONG_ENGAGEMENT_SEC: f64 = 120.0;

/// Time spent below which an interaction counts as skimmed
const SHORT_ENGAGEMENT_SEC: f64 = 30.0;

/// Multipliers are expressed in hundredths so products stay exact
const PERCENT: i128 = 100;

/// Three-step rating used by `answer_quality` and `confidence`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    High,
    Medium,
    Low,
}

impl Rating {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Rating::High),
            "medium" => Some(Rating::Medium),
            "low" => Some(Rating::Low),
            _ => None,
        }
    }
}

/// Recognised score modifiers; `None` means the neutral multiplier
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreModifiers {
    #[serde(default)]
    pub answer_quality: Option<Rating>,
    #[serde(default)]
    pub time_spent_seconds: Option<f64>,
    #[serde(default)]
    pub confidence: Option<Rating>,
}

impl ScoreModifiers {
    /// Extract the recognised modifiers from a free-form metadata map.
    ///
    /// Unrecognised keys are ignored and unparseable values are treated as
    /// absent.
    pub fn from_metadata(metadata: &EventMetadata) -> Self {
        let rating = |key: &str| {
            metadata
                .get(key)
                .and_then(|v| v.as_str())
                .and_then(Rating::parse)
        };

        let time_spent_seconds = metadata.get("time_spent_seconds").and_then(|v| {
            v.as_f64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        });

        Self {
            answer_quality: rating("answer_quality"),
            time_spent_seconds,
            confidence: rating("confidence"),
        }
    }

    fn answer_quality_pct(&self) -> i128 {
        match self.answer_quality {
            Some(Rating::High) => 150,
            Some(Rating::Low) => 70,
            Some(Rating::Medium) | None => 100,
        }
    }

    fn time_spent_pct(&self) -> i128 {
        match self.time_spent_seconds {
            Some(sec) if sec > LONG_ENGAGEMENT_SEC => 120,
            Some(sec) if sec < SHORT_ENGAGEMENT_SEC => 80,
            _ => 100,
        }
    }

    fn confidence_pct(&self) -> i128 {
        match self.confidence {
            Some(Rating::High) => 130,
            Some(Rating::Low) => 80,
            Some(Rating::Medium) | None => 100,
        }
    }

    /// Combined multiplier as a float, for reporting
    pub fn multiplier(&self) -> f64 {
        (self.answer_quality_pct() * self.time_spent_pct() * self.confidence_pct()) as f64
            / (PERCENT * PERCENT * PERCENT) as f64
    }
}

/// Computes per-event score impacts from an injected rule table
#[derive(Debug, Clone, Default)]
pub struct EventScoreCalculator {
    rules: ScoringRuleTable,
}

impl EventScoreCalculator {
    pub fn new(rules: ScoringRuleTable) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ScoringRuleTable {
        &self.rules
    }

    /// Score an event given its type and raw metadata
    pub fn compute_score(&self, event_type: &str, metadata: &EventMetadata) -> i64 {
        self.compute_with_modifiers(event_type, &ScoreModifiers::from_metadata(metadata))
    }

    /// Score an event given already-parsed modifiers.
    ///
    /// Result is `base * quality * time * confidence` truncated toward zero.
    pub fn compute_with_modifiers(&self, event_type: &str, modifiers: &ScoreModifiers) -> i64 {
        let base_score = self.rules.base_score(event_type);
        let scaled = i128::from(base_score)
            * modifiers.answer_quality_pct()
            * modifiers.time_spent_pct()
            * modifiers.confidence_pct();
        let score = scaled / (PERCENT * PERCENT * PERCENT);
        let score = i64::try_from(score).unwrap_or(if score < 0 { i64::MIN } else { i64::MAX });

        tracing::debug!(
            event_type,
            base_score,
            multiplier = modifiers.multiplier(),
            score,
            "computed event score"
        );

        score
    }
}
