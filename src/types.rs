//! Core entities
//!
//! Leads, the scoring events recorded against them, and the read-only
//! conversion and assessment-session records consumed by analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form metadata attached to an event
pub type EventMetadata = serde_json::Map<String, serde_json::Value>;

/// Lead status tier, ordered by ascending score threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    Cold,
    Qualified,
    Warm,
    Hot,
}

impl LeadStatus {
    /// All tiers, lowest threshold first
    pub const ALL: [LeadStatus; 4] = [
        LeadStatus::Cold,
        LeadStatus::Qualified,
        LeadStatus::Warm,
        LeadStatus::Hot,
    ];

    /// Minimum score required for this tier
    pub fn min_score(&self) -> i64 {
        match self {
            LeadStatus::Cold => 0,
            LeadStatus::Qualified => 25,
            LeadStatus::Warm => 50,
            LeadStatus::Hot => 75,
        }
    }

    /// Highest tier whose threshold is <= `score`, `Cold` if none qualifies
    pub fn from_score(score: i64) -> Self {
        Self::ALL
            .iter()
            .rev()
            .find(|status| status.min_score() <= score)
            .copied()
            .unwrap_or(LeadStatus::Cold)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Cold => "cold",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Warm => "warm",
            LeadStatus::Hot => "hot",
        }
    }
}

/// Category an event is recorded under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Engagement,
    Assessment,
    Conversion,
    Intent,
    Disengagement,
    Advocacy,
    /// Categories introduced by producers this engine does not know about
    #[serde(untagged)]
    Other(String),
}

impl EventCategory {
    pub fn parse(value: &str) -> Self {
        match value {
            "engagement" => EventCategory::Engagement,
            "assessment" => EventCategory::Assessment,
            "conversion" => EventCategory::Conversion,
            "intent" => EventCategory::Intent,
            "disengagement" => EventCategory::Disengagement,
            "advocacy" => EventCategory::Advocacy,
            other => EventCategory::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventCategory::Engagement => "engagement",
            EventCategory::Assessment => "assessment",
            EventCategory::Conversion => "conversion",
            EventCategory::Intent => "intent",
            EventCategory::Disengagement => "disengagement",
            EventCategory::Advocacy => "advocacy",
            EventCategory::Other(name) => name.as_str(),
        }
    }

    /// Breakdown bucket for this category; anything outside the closed set
    /// folds into `Engagement`
    pub fn score_category(&self) -> ScoreCategory {
        match self {
            EventCategory::Assessment => ScoreCategory::Assessment,
            EventCategory::Conversion => ScoreCategory::Conversion,
            EventCategory::Intent => ScoreCategory::Intent,
            EventCategory::Advocacy => ScoreCategory::Advocacy,
            EventCategory::Engagement
            | EventCategory::Disengagement
            | EventCategory::Other(_) => ScoreCategory::Engagement,
        }
    }
}

impl From<&str> for EventCategory {
    fn from(value: &str) -> Self {
        EventCategory::parse(value)
    }
}

/// Closed set of buckets used in score breakdowns
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    Engagement,
    Assessment,
    Conversion,
    Intent,
    Advocacy,
}

impl ScoreCategory {
    pub const ALL: [ScoreCategory; 5] = [
        ScoreCategory::Engagement,
        ScoreCategory::Assessment,
        ScoreCategory::Conversion,
        ScoreCategory::Intent,
        ScoreCategory::Advocacy,
    ];
}

/// A prospective customer captured via the assessment funnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Unique lead identifier
    pub id: Uuid,
    /// Contact email (unique per lead)
    pub email: String,
    /// Running raw score (sum of recorded impacts, may be negative)
    #[serde(default)]
    pub lead_score: i64,
    /// Tier derived from `lead_score`
    #[serde(default)]
    pub lead_status: LeadStatus,
    /// Timestamp of the most recently tracked event
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
    /// When the lead was captured
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// Create a fresh cold lead with no activity
    pub fn new(email: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            lead_score: 0,
            lead_status: LeadStatus::Cold,
            last_activity_at: None,
            created_at,
        }
    }
}

/// Immutable record of one behavioral interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringEvent {
    /// Event identifier
    pub id: Uuid,
    /// Owning lead
    pub lead_id: Uuid,
    /// Key into the scoring rule table
    pub event_type: String,
    /// Category the producer recorded the event under
    pub event_category: EventCategory,
    /// Free-text description of the action
    #[serde(default)]
    pub event_action: String,
    /// Score contribution fixed at creation time
    pub score_impact: i64,
    /// Assessment/browsing session the event belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    /// Producer-supplied metadata (answer quality, time spent, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: EventMetadata,
    /// Creation timestamp, used for ordering and decay
    pub created_at: DateTime<Utc>,
}

/// A lead's transition to paid or engaged status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub id: Uuid,
    pub lead_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub conversion_type: String,
    #[serde(default)]
    pub value: f64,
    pub converted_at: DateTime<Utc>,
}

/// Assessment session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Started,
    InProgress,
    Completed,
    Abandoned,
}

/// One pass of a lead through the assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentSession {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub status: SessionStatus,
    #[serde(default)]
    pub questions_answered: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}
