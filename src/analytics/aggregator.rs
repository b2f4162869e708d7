//! Score aggregation with time decay
//!
//! The aggregated total is the authoritative score. It is recomputed from the
//! full event history on every call and never written back to the lead.

use crate::analytics::engagement::EngagementAnalyzer;
use crate::analytics::probability::ConversionProbabilityEstimator;
use crate::analytics::types::{EventBreakdown, LeadScoreResult, ScoringFactors};
use crate::clock::Clock;
use crate::error::ScoringError;
use crate::store::{EventOrder, EventStore};
use crate::types::{LeadStatus, ScoringEvent};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

/// Decay factor in tenths for an event `days_ago` whole days old
pub fn decay_tenths(days_ago: i64) -> i64 {
    match days_ago {
        d if d <= 7 => 10,
        d if d <= 30 => 9,
        _ => 7,
    }
}

pub fn decay_factor(days_ago: i64) -> f64 {
    decay_tenths(days_ago) as f64 / 10.0
}

/// `floor(impact * factor)`, exact in integer arithmetic
pub fn decayed_contribution(impact: i64, days_ago: i64) -> i64 {
    let decayed = (i128::from(impact) * i128::from(decay_tenths(days_ago))).div_euclid(10);
    saturate(decayed)
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

/// Computes a lead's decayed score from its event history
pub struct ScoreAggregator {
    events: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
    estimator: ConversionProbabilityEstimator,
    engagement: EngagementAnalyzer,
}

impl ScoreAggregator {
    pub fn new(events: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events,
            clock,
            estimator: ConversionProbabilityEstimator,
            engagement: EngagementAnalyzer,
        }
    }

    pub fn calculate_lead_score(&self, lead_id: Uuid) -> Result<LeadScoreResult, ScoringError> {
        let events = self.events.query_events_by_lead(lead_id, EventOrder::NewestFirst)?;
        let result = self.aggregate(lead_id, &events, self.clock.now());

        tracing::debug!(
            lead_id = %lead_id,
            events = events.len(),
            total_score = result.total_score,
            status = result.lead_status.as_str(),
            "aggregated lead score"
        );

        Ok(result)
    }

    /// Aggregate an event history as of `now`
    pub fn aggregate(
        &self,
        lead_id: Uuid,
        events: &[ScoringEvent],
        now: DateTime<Utc>,
    ) -> LeadScoreResult {
        if events.is_empty() {
            return LeadScoreResult::empty(lead_id, now);
        }

        let mut total: i128 = 0;
        let mut event_breakdown = EventBreakdown::default();
        let mut event_counts: BTreeMap<String, u32> = BTreeMap::new();

        for event in events {
            let days_ago = (now - event.created_at).num_days();
            total += i128::from(decayed_contribution(event.score_impact, days_ago));
            event_breakdown.add(event.event_category.score_category(), event.score_impact);
            *event_counts.entry(event.event_type.clone()).or_insert(0) += 1;
        }

        let total_score = saturate(total);
        let last_activity = events.iter().map(|e| e.created_at).max();
        let conversion_probability = self.estimator.estimate(total_score, &event_counts, events);

        LeadScoreResult {
            lead_id,
            total_score,
            lead_status: LeadStatus::from_score(total_score),
            conversion_probability,
            last_activity,
            event_breakdown,
            scoring_factors: scoring_factors(events, &event_counts, last_activity, now),
            event_counts,
            engagement_metrics: self.engagement.engagement_metrics(events, now),
            computed_at: now,
        }
    }
}

fn scoring_factors(
    events: &[ScoringEvent],
    event_counts: &BTreeMap<String, u32>,
    last_activity: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> ScoringFactors {
    let mut per_session: HashMap<Uuid, u32> = HashMap::new();
    for session_id in events.iter().filter_map(|e| e.session_id) {
        *per_session.entry(session_id).or_insert(0) += 1;
    }
    let engagement_depth = if per_session.is_empty() {
        0.0
    } else {
        per_session.values().sum::<u32>() as f64 / per_session.len() as f64
    };

    ScoringFactors {
        recency: last_activity.map(|t| (now - t).num_days()).unwrap_or(0),
        frequency: events.len() as u32,
        engagement_depth,
        conversion_indicators: event_counts.get("results_viewed").copied().unwrap_or(0),
    }
}
