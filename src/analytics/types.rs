//! Analytics result types
//!
//! Everything the aggregator, journey analyzer, lead analytics and cohort
//! analytics hand back to callers.

use crate::types::{LeadStatus, ScoreCategory};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Raw score impact summed per breakdown category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBreakdown {
    pub engagement: i64,
    pub assessment: i64,
    pub conversion: i64,
    pub intent: i64,
    pub advocacy: i64,
}

impl EventBreakdown {
    pub fn add(&mut self, category: ScoreCategory, impact: i64) {
        let slot = self.slot_mut(category);
        *slot = slot.saturating_add(impact);
    }

    pub fn get(&self, category: ScoreCategory) -> i64 {
        match category {
            ScoreCategory::Engagement => self.engagement,
            ScoreCategory::Assessment => self.assessment,
            ScoreCategory::Conversion => self.conversion,
            ScoreCategory::Intent => self.intent,
            ScoreCategory::Advocacy => self.advocacy,
        }
    }

    fn slot_mut(&mut self, category: ScoreCategory) -> &mut i64 {
        match category {
            ScoreCategory::Engagement => &mut self.engagement,
            ScoreCategory::Assessment => &mut self.assessment,
            ScoreCategory::Conversion => &mut self.conversion,
            ScoreCategory::Intent => &mut self.intent,
            ScoreCategory::Advocacy => &mut self.advocacy,
        }
    }
}

/// Recency, frequency and depth metrics over an event list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    /// Whole days between now and the newest event
    pub days_since_last_activity: i64,
    /// Whole days between the oldest and newest event
    pub activity_span_days: i64,
    /// Events per day over the span (inclusive of both ends)
    pub avg_events_per_day: f64,
    /// Distinct UTC dates with at least one event
    pub engagement_consistency: u32,
    /// Hour of day (0-23) with the most events, lowest hour on ties
    pub peak_activity_hour: u32,
    /// Assessment-category events per assessment start
    pub session_depth: f64,
}

/// Inputs that went into a lead's score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringFactors {
    /// Whole days since the newest event
    pub recency: i64,
    /// Number of events
    pub frequency: u32,
    /// Average events per distinct session
    pub engagement_depth: f64,
    /// Number of `results_viewed` events
    pub conversion_indicators: u32,
}

/// Authoritative (decayed) score for a lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadScoreResult {
    pub lead_id: Uuid,
    pub total_score: i64,
    pub lead_status: LeadStatus,
    pub conversion_probability: f64,
    pub last_activity: Option<DateTime<Utc>>,
    pub event_breakdown: EventBreakdown,
    pub event_counts: BTreeMap<String, u32>,
    pub engagement_metrics: Option<EngagementMetrics>,
    pub scoring_factors: ScoringFactors,
    pub computed_at: DateTime<Utc>,
}

impl LeadScoreResult {
    /// Result for a lead with no recorded history
    pub fn empty(lead_id: Uuid, computed_at: DateTime<Utc>) -> Self {
        Self {
            lead_id,
            total_score: 0,
            lead_status: LeadStatus::Cold,
            conversion_probability: 0.0,
            last_activity: None,
            event_breakdown: EventBreakdown::default(),
            event_counts: BTreeMap::new(),
            engagement_metrics: None,
            scoring_factors: ScoringFactors::default(),
            computed_at,
        }
    }
}

/// Funnel phase, in journey order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStage {
    Awareness,
    Interest,
    Consideration,
    Intent,
    Conversion,
}

impl JourneyStage {
    pub const ALL: [JourneyStage; 5] = [
        JourneyStage::Awareness,
        JourneyStage::Interest,
        JourneyStage::Consideration,
        JourneyStage::Intent,
        JourneyStage::Conversion,
    ];

    /// Event types that place a lead in this stage
    pub fn event_types(&self) -> &'static [&'static str] {
        match self {
            JourneyStage::Awareness => &["lead_capture", "email_open"],
            JourneyStage::Interest => &["assessment_start", "pricing_viewed"],
            JourneyStage::Consideration => &["assessment_complete", "results_viewed"],
            JourneyStage::Intent => &["demo_requested", "consultation_booked"],
            JourneyStage::Conversion => &["trial_signup", "purchase"],
        }
    }

    pub fn for_event_type(event_type: &str) -> Option<JourneyStage> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.event_types().contains(&event_type))
    }
}

/// Assessment session funnel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssessmentFunnel {
    pub sessions_started: u32,
    pub sessions_completed: u32,
    pub completion_rate: f64,
    pub avg_questions_answered: f64,
}

/// Where a lead sits in the funnel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyAnalysis {
    /// Event count per stage; every stage is present
    pub journey_stages: BTreeMap<JourneyStage, u32>,
    pub current_stage: JourneyStage,
    pub assessment_funnel: AssessmentFunnel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    HighIntent,
    PricingInterest,
    StalledAssessment,
    Dormant,
    Disengaging,
    HighlyConsistent,
}

/// A human-readable observation about a lead's recent behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehavioralInsight {
    pub kind: InsightKind,
    pub message: String,
}

/// Stored lead fields included in analytics output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub id: Uuid,
    pub email: String,
    pub lead_score: i64,
    pub lead_status: LeadStatus,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Windowed analytics for a single lead
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadAnalytics {
    pub lead: LeadSummary,
    pub period_days: u32,
    pub total_events: u32,
    pub category_breakdown: EventBreakdown,
    /// Events per UTC date within the window
    pub daily_activity: BTreeMap<NaiveDate, u32>,
    pub engagement_metrics: Option<EngagementMetrics>,
    pub journey: JourneyAnalysis,
    pub insights: Vec<BehavioralInsight>,
    pub computed_at: DateTime<Utc>,
}

/// Granularity label attached to a cohort window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CohortType {
    Daily,
    Weekly,
    Monthly,
    Custom,
}

impl CohortType {
    /// Unrecognised labels become `Custom`
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => CohortType::Daily,
            "weekly" => CohortType::Weekly,
            "monthly" => CohortType::Monthly,
            _ => CohortType::Custom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub cohort_type: CohortType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortEngagement {
    /// Leads with at least one event
    pub active_leads: u32,
    pub total_events: u32,
    pub avg_events_per_lead: f64,
    pub assessment_starts: u32,
    pub assessment_completions: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortConversions {
    pub total_conversions: u32,
    /// Conversions divided by cohort size
    pub conversion_rate: f64,
    /// Mean hours from lead creation to conversion
    pub avg_hours_to_conversion: f64,
    pub conversions_by_type: BTreeMap<String, u32>,
}

/// Share of the cohort active in one ISO week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRetention {
    pub week: u32,
    pub active_leads: u32,
    pub retention_rate: f64,
}

/// Aggregate metrics over leads acquired in one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortMetrics {
    pub cohort_size: u32,
    pub acquisition_period: AcquisitionPeriod,
    pub engagement_metrics: CohortEngagement,
    pub conversion_metrics: CohortConversions,
    pub lead_distribution: BTreeMap<LeadStatus, u32>,
    pub retention_analysis: Vec<WeeklyRetention>,
    /// Set when the result is empty, explaining why
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub computed_at: DateTime<Utc>,
}
