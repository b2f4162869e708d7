//! Engagement metrics and journey analysis
//!
//! Both contracts are pure functions over an event list (and, for the
//! journey, the lead's assessment sessions).

use crate::analytics::types::{AssessmentFunnel, EngagementMetrics, JourneyAnalysis, JourneyStage};
use crate::types::{AssessmentSession, EventCategory, ScoringEvent, SessionStatus};
use chrono::{DateTime, Timelike, Utc};
use std::collections::{BTreeMap, HashSet};

/// Derives engagement metrics and journey position from lead activity
#[derive(Debug, Clone, Copy, Default)]
pub struct EngagementAnalyzer;

impl EngagementAnalyzer {
    /// Recency, spread and depth metrics, or `None` for an empty history
    pub fn engagement_metrics(
        &self,
        events: &[ScoringEvent],
        now: DateTime<Utc>,
    ) -> Option<EngagementMetrics> {
        let newest = events.iter().map(|e| e.created_at).max()?;
        let oldest = events.iter().map(|e| e.created_at).min()?;

        let span = (newest - oldest).num_days();
        let n = events.len() as f64;

        let active_dates: HashSet<_> = events.iter().map(|e| e.created_at.date_naive()).collect();

        let assessment_events = events
            .iter()
            .filter(|e| e.event_category == EventCategory::Assessment)
            .count();
        let assessment_starts = events
            .iter()
            .filter(|e| e.event_type == "assessment_start")
            .count();

        Some(EngagementMetrics {
            days_since_last_activity: (now - newest).num_days(),
            activity_span_days: span,
            avg_events_per_day: n / (span + 1).max(1) as f64,
            engagement_consistency: active_dates.len() as u32,
            peak_activity_hour: peak_hour(events),
            session_depth: assessment_events as f64 / assessment_starts.max(1) as f64,
        })
    }

    /// Stage counts, current stage and assessment funnel
    pub fn analyze_journey(
        &self,
        events: &[ScoringEvent],
        sessions: &[AssessmentSession],
    ) -> JourneyAnalysis {
        let mut journey_stages: BTreeMap<JourneyStage, u32> =
            JourneyStage::ALL.iter().map(|s| (*s, 0)).collect();
        for event in events {
            if let Some(stage) = JourneyStage::for_event_type(&event.event_type) {
                *journey_stages.entry(stage).or_insert(0) += 1;
            }
        }

        // Strict comparison keeps the earliest stage on ties
        let mut current_stage = JourneyStage::Awareness;
        let mut best = 0;
        for stage in JourneyStage::ALL {
            let count = journey_stages.get(&stage).copied().unwrap_or(0);
            if count > best {
                best = count;
                current_stage = stage;
            }
        }

        JourneyAnalysis {
            journey_stages,
            current_stage,
            assessment_funnel: assessment_funnel(sessions),
        }
    }
}

/// Hour of day with the most events; lowest hour wins ties
fn peak_hour(events: &[ScoringEvent]) -> u32 {
    let mut by_hour = [0u32; 24];
    for event in events {
        by_hour[event.created_at.hour() as usize] += 1;
    }

    let mut peak = 0;
    for hour in 1..24 {
        if by_hour[hour] > by_hour[peak] {
            peak = hour;
        }
    }
    peak as u32
}

fn assessment_funnel(sessions: &[AssessmentSession]) -> AssessmentFunnel {
    if sessions.is_empty() {
        return AssessmentFunnel::default();
    }

    let started = sessions.len() as u32;
    let completed = sessions
        .iter()
        .filter(|s| s.status == SessionStatus::Completed)
        .count() as u32;
    let questions: u32 = sessions.iter().map(|s| s.questions_answered).sum();

    AssessmentFunnel {
        sessions_started: started,
        sessions_completed: completed,
        completion_rate: completed as f64 / started as f64,
        avg_questions_answered: questions as f64 / started as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn event(event_type: &str, category: EventCategory, at: DateTime<Utc>) -> ScoringEvent {
        ScoringEvent {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            event_type: event_type.to_string(),
            event_category: category,
            event_action: String::new(),
            score_impact: 1,
            session_id: None,
            metadata: Default::default(),
            created_at: at,
        }
    }

    fn session(status: SessionStatus, questions: u32) -> AssessmentSession {
        AssessmentSession {
            id: Uuid::new_v4(),
            lead_id: Uuid::nil(),
            status,
            questions_answered: questions,
            started_at: now(),
            completed_at: None,
        }
    }

    #[test]
    fn test_engagement_metrics_empty_is_none() {
        assert!(EngagementAnalyzer.engagement_metrics(&[], now()).is_none());
    }

    #[test]
    fn test_engagement_metrics() {
        let day = Utc.with_ymd_and_hms(2024, 5, 10, 9, 15, 0).unwrap();
        let events = vec![
            event("assessment_start", EventCategory::Assessment, day),
            event("question_answered", EventCategory::Assessment, day + Duration::hours(5)),
            event("question_answered", EventCategory::Assessment, day + Duration::days(2)),
            event("page_view", EventCategory::Engagement, day + Duration::days(4)),
        ];

        let metrics = EngagementAnalyzer.engagement_metrics(&events, now()).unwrap();

        assert_eq!(metrics.days_since_last_activity, 6);
        assert_eq!(metrics.activity_span_days, 4);
        assert!((metrics.avg_events_per_day - 0.8).abs() < 1e-9);
        assert_eq!(metrics.engagement_consistency, 3);
        assert_eq!(metrics.peak_activity_hour, 9);
        assert!((metrics.session_depth - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_event_span() {
        let events = vec![event("page_view", EventCategory::Engagement, now())];
        let metrics = EngagementAnalyzer.engagement_metrics(&events, now()).unwrap();
        assert_eq!(metrics.activity_span_days, 0);
        assert_eq!(metrics.avg_events_per_day, 1.0);
        assert_eq!(metrics.session_depth, 0.0);
    }

    #[test]
    fn test_peak_hour_tie_goes_to_lowest() {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let events = vec![
            event("page_view", EventCategory::Engagement, base + Duration::hours(18)),
            event("page_view", EventCategory::Engagement, base + Duration::hours(7)),
            event("page_view", EventCategory::Engagement, base + Duration::days(1) + Duration::hours(18)),
            event("page_view", EventCategory::Engagement, base + Duration::days(1) + Duration::hours(7)),
        ];
        assert_eq!(peak_hour(&events), 7);
    }

    #[test]
    fn test_journey_current_stage() {
        let events = vec![
            event("email_open", EventCategory::Engagement, now()),
            event("pricing_viewed", EventCategory::Intent, now()),
            event("pricing_viewed", EventCategory::Intent, now()),
            event("results_viewed", EventCategory::Assessment, now()),
            event("page_view", EventCategory::Engagement, now()),
        ];
        let journey = EngagementAnalyzer.analyze_journey(&events, &[]);

        assert_eq!(journey.current_stage, JourneyStage::Interest);
        assert_eq!(journey.journey_stages[&JourneyStage::Interest], 2);
        assert_eq!(journey.journey_stages[&JourneyStage::Conversion], 0);
        assert_eq!(journey.journey_stages.len(), 5);
    }

    #[test]
    fn test_journey_ties_and_default() {
        let empty = EngagementAnalyzer.analyze_journey(&[], &[]);
        assert_eq!(empty.current_stage, JourneyStage::Awareness);

        let events = vec![
            event("purchase", EventCategory::Conversion, now()),
            event("demo_requested", EventCategory::Intent, now()),
        ];
        let tied = EngagementAnalyzer.analyze_journey(&events, &[]);
        assert_eq!(tied.current_stage, JourneyStage::Intent);
    }

    #[test]
    fn test_assessment_funnel() {
        let sessions = vec![
            session(SessionStatus::Completed, 10),
            session(SessionStatus::Abandoned, 3),
            session(SessionStatus::InProgress, 5),
            session(SessionStatus::Completed, 10),
        ];
        let funnel = EngagementAnalyzer.analyze_journey(&[], &sessions).assessment_funnel;

        assert_eq!(funnel.sessions_started, 4);
        assert_eq!(funnel.sessions_completed, 2);
        assert_eq!(funnel.completion_rate, 0.5);
        assert_eq!(funnel.avg_questions_answered, 7.0);
    }

    #[test]
    fn test_assessment_funnel_without_sessions() {
        let funnel = EngagementAnalyzer.analyze_journey(&[], &[]).assessment_funnel;
        assert_eq!(funnel, AssessmentFunnel::default());
    }
}
