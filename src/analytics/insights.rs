//! Windowed lead analytics and behavioral insights

use crate::analytics::engagement::EngagementAnalyzer;
use crate::analytics::types::{
    BehavioralInsight, EngagementMetrics, EventBreakdown, InsightKind, JourneyAnalysis,
    LeadAnalytics, LeadSummary,
};
use crate::clock::Clock;
use crate::error::ScoringError;
use crate::store::{EventStore, LeadStore, SessionStore};
use crate::types::{EventCategory, Lead, ScoringEvent};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Days without activity after which a lead is considered dormant
pub const DORMANT_AFTER_DAYS: i64 = 14;

/// Active days at which a lead is considered highly consistent
pub const CONSISTENT_ACTIVE_DAYS: u32 = 5;

/// Builds per-lead analytics over a trailing window
pub struct LeadAnalyzer {
    leads: Arc<dyn LeadStore>,
    events: Arc<dyn EventStore>,
    sessions: Option<Arc<dyn SessionStore>>,
    clock: Arc<dyn Clock>,
    engagement: EngagementAnalyzer,
}

impl LeadAnalyzer {
    pub fn new(leads: Arc<dyn LeadStore>, events: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            leads,
            events,
            sessions: None,
            clock,
            engagement: EngagementAnalyzer,
        }
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Analytics over the last `days_back` days of a lead's activity
    pub fn get_lead_analytics(
        &self,
        lead_id: Uuid,
        days_back: u32,
    ) -> Result<LeadAnalytics, ScoringError> {
        let lead = self
            .leads
            .get_lead(lead_id)?
            .ok_or_else(|| ScoringError::lead_not_found(lead_id))?;

        let now = self.clock.now();
        // Windows reaching past the representable range cover all history
        let cutoff = Duration::try_days(i64::from(days_back))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let events = self.events.query_events_by_lead_since(lead_id, cutoff)?;
        let sessions = match &self.sessions {
            Some(store) => store.query_sessions_by_lead(lead_id)?,
            None => Vec::new(),
        };

        let mut category_breakdown = EventBreakdown::default();
        let mut daily_activity = BTreeMap::new();
        for event in &events {
            category_breakdown.add(event.event_category.score_category(), event.score_impact);
            *daily_activity.entry(event.created_at.date_naive()).or_insert(0) += 1;
        }

        let engagement_metrics = self.engagement.engagement_metrics(&events, now);
        let journey = self.engagement.analyze_journey(&events, &sessions);
        let insights = derive_insights(&events, &journey, engagement_metrics.as_ref());

        tracing::debug!(
            lead_id = %lead_id,
            days_back,
            events = events.len(),
            insights = insights.len(),
            "built lead analytics"
        );

        Ok(LeadAnalytics {
            lead: summarize(&lead),
            period_days: days_back,
            total_events: events.len() as u32,
            category_breakdown,
            daily_activity,
            engagement_metrics,
            journey,
            insights,
            computed_at: now,
        })
    }
}

fn summarize(lead: &Lead) -> LeadSummary {
    LeadSummary {
        id: lead.id,
        email: lead.email.clone(),
        lead_score: lead.lead_score,
        lead_status: lead.lead_status,
        last_activity_at: lead.last_activity_at,
        created_at: lead.created_at,
    }
}

/// Insights for a window of events, in a fixed order
pub fn derive_insights(
    events: &[ScoringEvent],
    journey: &JourneyAnalysis,
    engagement: Option<&EngagementMetrics>,
) -> Vec<BehavioralInsight> {
    let count = |event_type: &str| events.iter().filter(|e| e.event_type == event_type).count();
    let mut insights = Vec::new();

    let intent = count("demo_requested") + count("consultation_booked");
    if intent > 0 {
        insights.push(BehavioralInsight {
            kind: InsightKind::HighIntent,
            message: format!("Lead has {intent} high-intent action(s) such as a demo request or consultation booking"),
        });
    }

    let pricing = count("pricing_viewed");
    if pricing >= 2 {
        insights.push(BehavioralInsight {
            kind: InsightKind::PricingInterest,
            message: format!("Lead viewed pricing {pricing} times"),
        });
    }

    let funnel = &journey.assessment_funnel;
    if funnel.sessions_started > funnel.sessions_completed {
        insights.push(BehavioralInsight {
            kind: InsightKind::StalledAssessment,
            message: format!(
                "{} of {} assessment session(s) were not completed",
                funnel.sessions_started - funnel.sessions_completed,
                funnel.sessions_started
            ),
        });
    }

    if let Some(metrics) = engagement {
        if metrics.days_since_last_activity >= DORMANT_AFTER_DAYS {
            insights.push(BehavioralInsight {
                kind: InsightKind::Dormant,
                message: format!("No activity for {} days", metrics.days_since_last_activity),
            });
        }
    }

    let disengaged = events
        .iter()
        .filter(|e| e.event_category == EventCategory::Disengagement)
        .count();
    if disengaged > 0 {
        insights.push(BehavioralInsight {
            kind: InsightKind::Disengaging,
            message: format!("Lead has {disengaged} disengagement signal(s) such as unsubscribes or bounces"),
        });
    }

    if let Some(metrics) = engagement {
        if metrics.engagement_consistency >= CONSISTENT_ACTIVE_DAYS {
            insights.push(BehavioralInsight {
                kind: InsightKind::HighlyConsistent,
                message: format!("Lead was active on {} distinct days", metrics.engagement_consistency),
            });
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryStore;
    use crate::types::{AssessmentSession, SessionStatus};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap()
    }

    fn insight_kinds(insights: &[BehavioralInsight]) -> Vec<InsightKind> {
        insights.iter().map(|i| i.kind).collect()
    }

    fn event(lead_id: Uuid, event_type: &str, category: EventCategory, days_ago: i64) -> ScoringEvent {
        ScoringEvent {
            id: Uuid::new_v4(),
            lead_id,
            event_type: event_type.to_string(),
            event_category: category,
            event_action: String::new(),
            score_impact: 5,
            session_id: None,
            metadata: Default::default(),
            created_at: now() - Duration::days(days_ago),
        }
    }

    fn analyzer(store: &Arc<InMemoryStore>) -> LeadAnalyzer {
        LeadAnalyzer::new(store.clone(), store.clone(), Arc::new(FixedClock(now())))
            .with_sessions(store.clone())
    }

    #[test]
    fn test_missing_lead_is_not_found() {
        let store = Arc::new(InMemoryStore::new());
        let err = analyzer(&store)
            .get_lead_analytics(Uuid::new_v4(), 30)
            .unwrap_err();
        assert!(matches!(err, ScoringError::NotFound { .. }));
    }

    #[test]
    fn test_window_excludes_old_events() {
        let store = Arc::new(InMemoryStore::new());
        let lead = Lead::new("window@example.com", now() - Duration::days(90));
        let lead_id = lead.id;
        store.insert_lead(lead);
        store.insert_event(event(lead_id, "page_view", EventCategory::Engagement, 2));
        store.insert_event(event(lead_id, "page_view", EventCategory::Engagement, 2));
        store.insert_event(event(lead_id, "email_open", EventCategory::Engagement, 10));
        store.insert_event(event(lead_id, "purchase", EventCategory::Conversion, 45));

        let analytics = analyzer(&store).get_lead_analytics(lead_id, 30).unwrap();

        assert_eq!(analytics.period_days, 30);
        assert_eq!(analytics.total_events, 3);
        assert_eq!(analytics.category_breakdown.engagement, 15);
        assert_eq!(analytics.category_breakdown.conversion, 0);
        assert_eq!(analytics.daily_activity.len(), 2);
        let day = (now() - Duration::days(2)).date_naive();
        assert_eq!(analytics.daily_activity[&day], 2);
        assert_eq!(analytics.lead.email, "window@example.com");
    }

    #[test]
    fn test_unbounded_window_covers_all_history() {
        let store = Arc::new(InMemoryStore::new());
        let lead = Lead::new("veteran@example.com", now() - Duration::days(4000));
        let lead_id = lead.id;
        store.insert_lead(lead);
        store.insert_event(event(lead_id, "page_view", EventCategory::Engagement, 1));
        store.insert_event(event(lead_id, "purchase", EventCategory::Conversion, 3650));

        let analytics = analyzer(&store).get_lead_analytics(lead_id, u32::MAX).unwrap();

        assert_eq!(analytics.period_days, u32::MAX);
        assert_eq!(analytics.total_events, 2);
        assert_eq!(analytics.category_breakdown.conversion, 5);
    }

    #[test]
    fn test_insights_in_fixed_order() {
        let store = Arc::new(InMemoryStore::new());
        let lead = Lead::new("busy@example.com", now() - Duration::days(60));
        let lead_id = lead.id;
        store.insert_lead(lead);
        for days_ago in 0..5 {
            store.insert_event(event(lead_id, "page_view", EventCategory::Engagement, days_ago));
        }
        store.insert_event(event(lead_id, "pricing_viewed", EventCategory::Intent, 1));
        store.insert_event(event(lead_id, "pricing_viewed", EventCategory::Intent, 2));
        store.insert_event(event(lead_id, "demo_requested", EventCategory::Intent, 0));
        store.insert_event(event(lead_id, "email_unsubscribe", EventCategory::Disengagement, 3));
        store.insert_session(AssessmentSession {
            id: Uuid::new_v4(),
            lead_id,
            status: SessionStatus::Abandoned,
            questions_answered: 2,
            started_at: now() - Duration::days(4),
            completed_at: None,
        });

        let analytics = analyzer(&store).get_lead_analytics(lead_id, 30).unwrap();

        assert_eq!(
            insight_kinds(&analytics.insights),
            vec![
                InsightKind::HighIntent,
                InsightKind::PricingInterest,
                InsightKind::StalledAssessment,
                InsightKind::Disengaging,
                InsightKind::HighlyConsistent,
            ]
        );
    }

    #[test]
    fn test_dormant_lead() {
        let store = Arc::new(InMemoryStore::new());
        let lead = Lead::new("quiet@example.com", now() - Duration::days(60));
        let lead_id = lead.id;
        store.insert_lead(lead);
        store.insert_event(event(lead_id, "email_open", EventCategory::Engagement, 20));

        let analytics = analyzer(&store).get_lead_analytics(lead_id, 30).unwrap();
        assert_eq!(insight_kinds(&analytics.insights), vec![InsightKind::Dormant]);
    }

    #[test]
    fn test_empty_window_has_no_insights() {
        let store = Arc::new(InMemoryStore::new());
        let lead = Lead::new("new@example.com", now());
        let lead_id = lead.id;
        store.insert_lead(lead);

        let analytics = analyzer(&store).get_lead_analytics(lead_id, 7).unwrap();
        assert_eq!(analytics.total_events, 0);
        assert!(analytics.engagement_metrics.is_none());
        assert!(analytics.insights.is_empty());
    }
}
