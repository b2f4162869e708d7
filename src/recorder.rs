//! Event recording
//!
//! Persists scoring events and keeps each lead's running score and status in
//! step with them. Writes for the same lead are serialised through a per-lead
//! lock; the event append and the lead update either both land or neither does.

use crate::calculator::EventScoreCalculator;
use crate::clock::{Clock, SystemClock};
use crate::error::ScoringError;
use crate::store::{lead_event_key, lead_score_key, EventStore, LeadStore, ScoreCache};
use crate::types::{EventCategory, EventMetadata, Lead, LeadStatus, ScoringEvent};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// A request to record one interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEventRequest {
    pub lead_id: Uuid,
    pub event_type: String,
    pub event_category: EventCategory,
    #[serde(default)]
    pub event_action: String,
    /// Explicit impact; computed from the rule table when absent
    #[serde(default)]
    pub score_impact: Option<i64>,
    /// Raw session identifier as supplied by the caller
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl TrackEventRequest {
    pub fn new(
        lead_id: Uuid,
        event_type: impl Into<String>,
        event_category: impl Into<EventCategory>,
    ) -> Self {
        Self {
            lead_id,
            event_type: event_type.into(),
            event_category: event_category.into(),
            event_action: String::new(),
            score_impact: None,
            session_id: None,
            metadata: EventMetadata::new(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.event_action = action.into();
        self
    }

    pub fn with_score_impact(mut self, score_impact: i64) -> Self {
        self.score_impact = Some(score_impact);
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A lead moving between status tiers as the result of a tracked event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub lead_id: Uuid,
    pub from: LeadStatus,
    pub to: LeadStatus,
    pub lead_score: i64,
    pub at: DateTime<Utc>,
}

/// Recorder behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Reject events for unknown leads instead of recording them as orphans
    #[serde(default)]
    pub reject_orphan_events: bool,
}

pub type TransitionHook = Arc<dyn Fn(&StatusTransition) + Send + Sync>;

/// Registry of per-lead write locks
#[derive(Debug, Default)]
struct LeadLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl LeadLocks {
    fn lock_for(&self, lead_id: Uuid) -> Arc<Mutex<()>> {
        self.locks.lock().entry(lead_id).or_default().clone()
    }

    /// Drop the registry entry once no other writer holds or waits on it.
    /// The caller must have released its guard.
    fn release(&self, lead_id: Uuid, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // One handle in the map, one held by the caller
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&lead_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Records events and maintains lead score/status
pub struct EventRecorder {
    calculator: EventScoreCalculator,
    leads: Arc<dyn LeadStore>,
    events: Arc<dyn EventStore>,
    cache: Option<Arc<dyn ScoreCache>>,
    clock: Arc<dyn Clock>,
    config: RecorderConfig,
    on_transition: Option<TransitionHook>,
    locks: LeadLocks,
}

impl EventRecorder {
    pub fn new(
        calculator: EventScoreCalculator,
        leads: Arc<dyn LeadStore>,
        events: Arc<dyn EventStore>,
    ) -> Self {
        Self {
            calculator,
            leads,
            events,
            cache: None,
            clock: Arc::new(SystemClock),
            config: RecorderConfig::default(),
            on_transition: None,
            locks: LeadLocks::default(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ScoreCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: RecorderConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a callback invoked after a tracked event changes a lead's tier
    pub fn on_status_change(mut self, hook: TransitionHook) -> Self {
        self.on_transition = Some(hook);
        self
    }

    pub fn calculator(&self) -> &EventScoreCalculator {
        &self.calculator
    }

    /// Record an interaction and apply its impact to the lead
    pub fn track_event(&self, request: TrackEventRequest) -> Result<ScoringEvent, ScoringError> {
        let lead_id = request.lead_id;
        let session_id = parse_session_id(request.session_id.as_deref(), lead_id);
        let score_impact = request.score_impact.unwrap_or_else(|| {
            self.calculator
                .compute_score(&request.event_type, &request.metadata)
        });

        let lock = self.locks.lock_for(lead_id);
        let (event, outcome) = {
            let _guard = lock.lock();
            let event = ScoringEvent {
                id: Uuid::new_v4(),
                lead_id,
                event_type: request.event_type,
                event_category: request.event_category,
                event_action: request.event_action,
                score_impact,
                session_id,
                metadata: request.metadata,
                created_at: self.clock.now(),
            };
            let outcome = self.record_locked(&event);
            (event, outcome)
        };
        self.locks.release(lead_id, lock);
        let transition = outcome?;

        tracing::debug!(
            %lead_id,
            event_type = %event.event_type,
            score_impact,
            "tracked event"
        );

        self.update_cache(&event);

        if let Some(transition) = transition {
            tracing::info!(
                %lead_id,
                from = transition.from.as_str(),
                to = transition.to.as_str(),
                lead_score = transition.lead_score,
                "lead status changed"
            );
            if let Some(hook) = &self.on_transition {
                hook(&transition);
            }
        }

        Ok(event)
    }

    /// Persist one event for its lead. Caller holds the lead lock.
    fn record_locked(&self, event: &ScoringEvent) -> Result<Option<StatusTransition>, ScoringError> {
        let lead_id = event.lead_id;
        match self.leads.get_lead(lead_id)? {
            Some(lead) => self.apply_to_lead(lead, event),
            None if self.config.reject_orphan_events => Err(ScoringError::lead_not_found(lead_id)),
            None => {
                tracing::warn!(%lead_id, event_type = %event.event_type, "lead not found, recording orphan event");
                self.events.append_event(event)?;
                Ok(None)
            }
        }
    }

    /// Write the updated lead, then append the event; restore the previous
    /// lead snapshot if the append fails. Caller holds the lead lock.
    fn apply_to_lead(
        &self,
        lead: Lead,
        event: &ScoringEvent,
    ) -> Result<Option<StatusTransition>, ScoringError> {
        let lead_score = lead.lead_score.checked_add(event.score_impact).ok_or_else(|| {
            ScoringError::Validation(format!(
                "score impact {} overflows lead score {} for lead {}",
                event.score_impact, lead.lead_score, lead.id
            ))
        })?;

        let mut updated = lead.clone();
        updated.lead_score = lead_score;
        updated.last_activity_at = Some(event.created_at);
        updated.lead_status = LeadStatus::from_score(updated.lead_score);

        self.leads.update_lead(&updated)?;

        if let Err(err) = self.events.append_event(event) {
            if let Err(rollback_err) = self.leads.update_lead(&lead) {
                tracing::error!(
                    lead_id = %lead.id,
                    error = %rollback_err,
                    "failed to roll back lead after event append failure"
                );
            }
            return Err(err);
        }

        Ok((lead.lead_status != updated.lead_status).then(|| StatusTransition {
            lead_id: lead.id,
            from: lead.lead_status,
            to: updated.lead_status,
            lead_score: updated.lead_score,
            at: event.created_at,
        }))
    }

    fn update_cache(&self, event: &ScoringEvent) {
        let Some(cache) = &self.cache else {
            return;
        };

        let result = cache
            .increment(&lead_score_key(event.lead_id), event.score_impact)
            .and_then(|_| cache.increment(&lead_event_key(event.lead_id, &event.event_type), 1));

        if let Err(err) = result {
            tracing::warn!(lead_id = %event.lead_id, error = %err, "score cache update failed");
        }
    }
}

fn parse_session_id(raw: Option<&str>, lead_id: Uuid) -> Option<Uuid> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::warn!(%lead_id, session_id = raw, error = %err, "ignoring malformed session id");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::{EventOrder, InMemoryScoreCache, InMemoryStore};
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn setup() -> (Arc<InMemoryStore>, EventRecorder, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let lead = Lead::new("lead@example.com", now());
        let lead_id = lead.id;
        store.insert_lead(lead);
        let recorder = EventRecorder::new(
            EventScoreCalculator::default(),
            store.clone(),
            store.clone(),
        )
        .with_clock(Arc::new(FixedClock(now())));
        (store, recorder, lead_id)
    }

    struct FailingEvents;

    impl EventStore for FailingEvents {
        fn append_event(&self, _event: &ScoringEvent) -> Result<(), ScoringError> {
            Err(ScoringError::TransientStore("event log offline".into()))
        }

        fn query_events_by_lead(
            &self,
            _lead_id: Uuid,
            _order: EventOrder,
        ) -> Result<Vec<ScoringEvent>, ScoringError> {
            Ok(Vec::new())
        }

        fn query_events_by_lead_since(
            &self,
            _lead_id: Uuid,
            _cutoff: DateTime<Utc>,
        ) -> Result<Vec<ScoringEvent>, ScoringError> {
            Ok(Vec::new())
        }
    }

    /// Serves one lead but refuses every write
    struct FailingLeads(Lead);

    impl LeadStore for FailingLeads {
        fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, ScoringError> {
            Ok((id == self.0.id).then(|| self.0.clone()))
        }

        fn update_lead(&self, _lead: &Lead) -> Result<(), ScoringError> {
            Err(ScoringError::TransientStore("lead store offline".into()))
        }

        fn query_leads_created_between(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Lead>, ScoringError> {
            Ok(Vec::new())
        }
    }

    struct FailingCache;

    impl ScoreCache for FailingCache {
        fn increment(&self, _key: &str, _delta: i64) -> Result<i64, ScoringError> {
            Err(ScoringError::DegradedDependency("cache offline".into()))
        }
    }

    #[test]
    fn test_assessment_start_scores_fifteen() {
        let (store, recorder, lead_id) = setup();

        let event = recorder
            .track_event(TrackEventRequest::new(lead_id, "assessment_start", "assessment"))
            .unwrap();

        assert_eq!(event.score_impact, 15);
        assert_eq!(event.created_at, now());

        let lead = store.get_lead(lead_id).unwrap().unwrap();
        assert_eq!(lead.lead_score, 15);
        assert_eq!(lead.lead_status, LeadStatus::Cold);
        assert_eq!(lead.last_activity_at, Some(now()));
    }

    #[test]
    fn test_metadata_drives_computed_impact() {
        let (_, recorder, lead_id) = setup();
        let metadata = json!({ "answer_quality": "high", "time_spent_seconds": 150 })
            .as_object()
            .cloned()
            .unwrap();

        let event = recorder
            .track_event(
                TrackEventRequest::new(lead_id, "question_answered", "assessment")
                    .with_metadata(metadata),
            )
            .unwrap();
        assert_eq!(event.score_impact, 9);
    }

    #[test]
    fn test_explicit_impact_overrides_rules() {
        let (store, recorder, lead_id) = setup();
        recorder
            .track_event(
                TrackEventRequest::new(lead_id, "purchase", "conversion").with_score_impact(-3),
            )
            .unwrap();
        assert_eq!(store.get_lead(lead_id).unwrap().unwrap().lead_score, -3);
    }

    #[test]
    fn test_status_transition_hook_fires_once_per_change() {
        let (_, recorder, lead_id) = setup();
        let seen: Arc<Mutex<Vec<StatusTransition>>> = Arc::default();
        let sink = seen.clone();
        let recorder = recorder.on_status_change(Arc::new(move |t: &StatusTransition| {
            sink.lock().push(t.clone())
        }));

        for _ in 0..3 {
            recorder
                .track_event(TrackEventRequest::new(lead_id, "pricing_viewed", "intent"))
                .unwrap();
        }

        let seen = seen.lock();
        let tiers: Vec<(LeadStatus, LeadStatus)> = seen.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            tiers,
            vec![
                (LeadStatus::Cold, LeadStatus::Qualified),
                (LeadStatus::Qualified, LeadStatus::Warm)
            ]
        );
        assert_eq!(seen[1].lead_score, 60);
    }

    #[test]
    fn test_orphan_event_is_recorded_by_default() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = EventRecorder::new(
            EventScoreCalculator::default(),
            store.clone(),
            store.clone(),
        );
        let orphan = Uuid::new_v4();

        recorder
            .track_event(TrackEventRequest::new(orphan, "page_view", "engagement"))
            .unwrap();

        assert_eq!(store.event_count(), 1);
        assert!(store.get_lead(orphan).unwrap().is_none());
    }

    #[test]
    fn test_orphan_event_rejected_in_strict_mode() {
        let store = Arc::new(InMemoryStore::new());
        let recorder = EventRecorder::new(
            EventScoreCalculator::default(),
            store.clone(),
            store.clone(),
        )
        .with_config(RecorderConfig {
            reject_orphan_events: true,
        });

        let err = recorder
            .track_event(TrackEventRequest::new(Uuid::new_v4(), "page_view", "engagement"))
            .unwrap_err();

        assert!(matches!(err, ScoringError::NotFound { .. }));
        assert_eq!(store.event_count(), 0);
    }

    #[test]
    fn test_failed_append_rolls_back_lead() {
        let store = Arc::new(InMemoryStore::new());
        let lead = Lead::new("lead@example.com", now());
        let lead_id = lead.id;
        store.insert_lead(lead.clone());
        let recorder = EventRecorder::new(
            EventScoreCalculator::default(),
            store.clone(),
            Arc::new(FailingEvents),
        );

        let err = recorder
            .track_event(TrackEventRequest::new(lead_id, "purchase", "conversion"))
            .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(store.get_lead(lead_id).unwrap().unwrap(), lead);
    }

    #[test]
    fn test_failed_lead_update_appends_nothing() {
        let lead = Lead::new("lead@example.com", now());
        let lead_id = lead.id;
        let events = Arc::new(InMemoryStore::new());
        let recorder = EventRecorder::new(
            EventScoreCalculator::default(),
            Arc::new(FailingLeads(lead)),
            events.clone(),
        );

        let err = recorder
            .track_event(TrackEventRequest::new(lead_id, "purchase", "conversion"))
            .unwrap_err();

        assert!(matches!(err, ScoringError::TransientStore(_)));
        assert!(err.is_retryable());
        assert_eq!(events.event_count(), 0);
    }

    #[test]
    fn test_overflowing_impact_is_rejected_without_writes() {
        let (store, recorder, lead_id) = setup();
        let half = i64::MAX / 2 + 1;

        recorder
            .track_event(
                TrackEventRequest::new(lead_id, "custom", "engagement").with_score_impact(half),
            )
            .unwrap();
        let err = recorder
            .track_event(
                TrackEventRequest::new(lead_id, "custom", "engagement").with_score_impact(half),
            )
            .unwrap_err();

        assert!(matches!(err, ScoringError::Validation(_)));
        assert_eq!(store.get_lead(lead_id).unwrap().unwrap().lead_score, half);
        assert_eq!(store.event_count(), 1);
    }

    #[test]
    fn test_lock_registry_is_pruned_after_each_call() {
        let (store, recorder, lead_id) = setup();

        recorder
            .track_event(TrackEventRequest::new(lead_id, "page_view", "engagement"))
            .unwrap();
        recorder
            .track_event(TrackEventRequest::new(Uuid::new_v4(), "page_view", "engagement"))
            .unwrap();
        assert_eq!(recorder.locks.len(), 0);

        let strict = EventRecorder::new(
            EventScoreCalculator::default(),
            store.clone(),
            store.clone(),
        )
        .with_config(RecorderConfig {
            reject_orphan_events: true,
        });
        for _ in 0..3 {
            assert!(strict
                .track_event(TrackEventRequest::new(Uuid::new_v4(), "page_view", "engagement"))
                .is_err());
        }
        assert_eq!(strict.locks.len(), 0);
    }

    #[test]
    fn test_cache_failure_does_not_fail_tracking() {
        let (store, recorder, lead_id) = setup();
        let recorder = recorder.with_cache(Arc::new(FailingCache));

        let result = recorder.track_event(TrackEventRequest::new(lead_id, "email_open", "engagement"));

        assert!(result.is_ok());
        assert_eq!(store.get_lead(lead_id).unwrap().unwrap().lead_score, 3);
    }

    #[test]
    fn test_cache_counters_are_incremented() {
        let (_, recorder, lead_id) = setup();
        let cache = Arc::new(InMemoryScoreCache::new());
        let recorder = recorder.with_cache(cache.clone());

        for _ in 0..2 {
            recorder
                .track_event(TrackEventRequest::new(lead_id, "email_open", "engagement"))
                .unwrap();
        }

        assert_eq!(cache.get(&lead_score_key(lead_id)), Some(6));
        assert_eq!(cache.get(&lead_event_key(lead_id, "email_open")), Some(2));
    }

    #[test]
    fn test_malformed_session_id_is_omitted() {
        let (_, recorder, lead_id) = setup();
        let session = Uuid::new_v4();

        let good = recorder
            .track_event(
                TrackEventRequest::new(lead_id, "page_view", "engagement")
                    .with_session_id(session.to_string()),
            )
            .unwrap();
        let bad = recorder
            .track_event(
                TrackEventRequest::new(lead_id, "page_view", "engagement")
                    .with_session_id("not-a-session"),
            )
            .unwrap();

        assert_eq!(good.session_id, Some(session));
        assert_eq!(bad.session_id, None);
    }

    #[test]
    fn test_concurrent_tracking_is_additive() {
        let (store, recorder, lead_id) = setup();
        let other = Lead::new("other@example.com", now());
        let other_id = other.id;
        store.insert_lead(other);

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let recorder = &recorder;
                scope.spawn(move || {
                    let target = if worker % 2 == 0 { lead_id } else { other_id };
                    for _ in 0..50 {
                        recorder
                            .track_event(
                                TrackEventRequest::new(target, "custom", "engagement")
                                    .with_score_impact(2),
                            )
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(store.get_lead(lead_id).unwrap().unwrap().lead_score, 400);
        assert_eq!(store.get_lead(other_id).unwrap().unwrap().lead_score, 400);
        assert_eq!(store.event_count(), 400);
        assert_eq!(recorder.locks.len(), 0);
    }
}
