//! In-memory stores
//!
//! A single `InMemoryStore` implements every storage contract behind
//! `parking_lot` locks. It can be seeded from and saved to NDJSON, which is
//! how the CLI feeds it.

use crate::error::ScoringError;
use crate::store::{ConversionStore, EventOrder, EventStore, LeadStore, ScoreCache, SessionStore};
use crate::types::{AssessmentSession, ConversionRecord, Lead, ScoringEvent};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use uuid::Uuid;

/// Parse NDJSON (newline-delimited JSON), skipping blank lines
pub fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, ScoringError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                return Err(ScoringError::Parse(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(records)
}

fn to_ndjson<T: Serialize>(records: &[T]) -> Result<String, ScoringError> {
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

/// Thread-safe in-memory lead, event, conversion and session store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    leads: RwLock<HashMap<Uuid, Lead>>,
    /// Events per lead in append order
    events: RwLock<HashMap<Uuid, Vec<ScoringEvent>>>,
    conversions: RwLock<Vec<ConversionRecord>>,
    sessions: RwLock<HashMap<Uuid, Vec<AssessmentSession>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_lead(&self, lead: Lead) {
        self.leads.write().insert(lead.id, lead);
    }

    pub fn insert_event(&self, event: ScoringEvent) {
        self.events
            .write()
            .entry(event.lead_id)
            .or_default()
            .push(event);
    }

    pub fn insert_conversion(&self, conversion: ConversionRecord) {
        self.conversions.write().push(conversion);
    }

    pub fn insert_session(&self, session: AssessmentSession) {
        self.sessions
            .write()
            .entry(session.lead_id)
            .or_default()
            .push(session);
    }

    pub fn event_count(&self) -> usize {
        self.events.read().values().map(Vec::len).sum()
    }

    /// Every stored event, oldest first
    pub fn all_events(&self) -> Vec<ScoringEvent> {
        let mut events: Vec<ScoringEvent> = self.events.read().values().flatten().cloned().collect();
        events.sort_by_key(|e| e.created_at);
        events
    }

    pub fn load_leads_ndjson(&self, ndjson: &str) -> Result<usize, ScoringError> {
        let leads: Vec<Lead> = parse_ndjson(ndjson)?;
        let count = leads.len();
        leads.into_iter().for_each(|lead| self.insert_lead(lead));
        Ok(count)
    }

    pub fn load_events_ndjson(&self, ndjson: &str) -> Result<usize, ScoringError> {
        let events: Vec<ScoringEvent> = parse_ndjson(ndjson)?;
        let count = events.len();
        events.into_iter().for_each(|event| self.insert_event(event));
        Ok(count)
    }

    pub fn load_conversions_ndjson(&self, ndjson: &str) -> Result<usize, ScoringError> {
        let conversions: Vec<ConversionRecord> = parse_ndjson(ndjson)?;
        let count = conversions.len();
        conversions
            .into_iter()
            .for_each(|conversion| self.insert_conversion(conversion));
        Ok(count)
    }

    pub fn load_sessions_ndjson(&self, ndjson: &str) -> Result<usize, ScoringError> {
        let sessions: Vec<AssessmentSession> = parse_ndjson(ndjson)?;
        let count = sessions.len();
        sessions
            .into_iter()
            .for_each(|session| self.insert_session(session));
        Ok(count)
    }

    /// Serialize the event log to NDJSON, oldest first
    pub fn events_to_ndjson(&self) -> Result<String, ScoringError> {
        to_ndjson(&self.all_events())
    }

    /// Serialize all leads to NDJSON, ordered by creation time
    pub fn leads_to_ndjson(&self) -> Result<String, ScoringError> {
        let mut leads: Vec<Lead> = self.leads.read().values().cloned().collect();
        leads.sort_by_key(|l| (l.created_at, l.id));
        to_ndjson(&leads)
    }
}

impl LeadStore for InMemoryStore {
    fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, ScoringError> {
        Ok(self.leads.read().get(&id).cloned())
    }

    fn update_lead(&self, lead: &Lead) -> Result<(), ScoringError> {
        self.leads.write().insert(lead.id, lead.clone());
        Ok(())
    }

    fn query_leads_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Lead>, ScoringError> {
        let mut leads: Vec<Lead> = self
            .leads
            .read()
            .values()
            .filter(|lead| lead.created_at >= start && lead.created_at <= end)
            .cloned()
            .collect();
        leads.sort_by_key(|l| (l.created_at, l.id));
        Ok(leads)
    }
}

impl EventStore for InMemoryStore {
    fn append_event(&self, event: &ScoringEvent) -> Result<(), ScoringError> {
        self.insert_event(event.clone());
        Ok(())
    }

    fn query_events_by_lead(
        &self,
        lead_id: Uuid,
        order: EventOrder,
    ) -> Result<Vec<ScoringEvent>, ScoringError> {
        let mut events = self
            .events
            .read()
            .get(&lead_id)
            .cloned()
            .unwrap_or_default();
        match order {
            EventOrder::NewestFirst => events.sort_by_key(|e| Reverse(e.created_at)),
            EventOrder::OldestFirst => events.sort_by_key(|e| e.created_at),
        }
        Ok(events)
    }

    fn query_events_by_lead_since(
        &self,
        lead_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ScoringEvent>, ScoringError> {
        let mut events = self.query_events_by_lead(lead_id, EventOrder::NewestFirst)?;
        events.retain(|e| e.created_at >= cutoff);
        Ok(events)
    }
}

impl ConversionStore for InMemoryStore {
    fn query_conversions_by_leads(
        &self,
        lead_ids: &[Uuid],
    ) -> Result<Vec<ConversionRecord>, ScoringError> {
        Ok(self
            .conversions
            .read()
            .iter()
            .filter(|c| lead_ids.contains(&c.lead_id))
            .cloned()
            .collect())
    }
}

impl SessionStore for InMemoryStore {
    fn query_sessions_by_lead(
        &self,
        lead_id: Uuid,
    ) -> Result<Vec<AssessmentSession>, ScoringError> {
        Ok(self
            .sessions
            .read()
            .get(&lead_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// In-process counter cache
#[derive(Debug, Default)]
pub struct InMemoryScoreCache {
    counters: Mutex<HashMap<String, i64>>,
}

impl InMemoryScoreCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<i64> {
        self.counters.lock().get(key).copied()
    }
}

impl ScoreCache for InMemoryScoreCache {
    fn increment(&self, key: &str, delta: i64) -> Result<i64, ScoringError> {
        let mut counters = self.counters.lock();
        let value = counters.entry(key.to_string()).or_insert(0);
        *value = value.saturating_add(delta);
        Ok(*value)
    }
}
