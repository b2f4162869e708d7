//! Storage contracts
//!
//! The engine does not own persistence. It reads and writes through these
//! traits, and `memory` provides a thread-safe reference implementation used
//! by the CLI and tests.

pub mod memory;

use crate::error::ScoringError;
use crate::types::{AssessmentSession, ConversionRecord, Lead, ScoringEvent};
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::{parse_ndjson, InMemoryScoreCache, InMemoryStore};

/// Ordering for event history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrder {
    NewestFirst,
    OldestFirst,
}

/// Read/write access to lead records
pub trait LeadStore: Send + Sync {
    fn get_lead(&self, id: Uuid) -> Result<Option<Lead>, ScoringError>;

    fn update_lead(&self, lead: &Lead) -> Result<(), ScoringError>;

    /// Leads whose `created_at` falls in `[start, end]`
    fn query_leads_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Lead>, ScoringError>;
}

/// Append-only event log
pub trait EventStore: Send + Sync {
    fn append_event(&self, event: &ScoringEvent) -> Result<(), ScoringError>;

    fn query_events_by_lead(
        &self,
        lead_id: Uuid,
        order: EventOrder,
    ) -> Result<Vec<ScoringEvent>, ScoringError>;

    /// Events created at or after `cutoff`, newest first
    fn query_events_by_lead_since(
        &self,
        lead_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<ScoringEvent>, ScoringError>;
}

/// Read-only conversion records
pub trait ConversionStore: Send + Sync {
    fn query_conversions_by_leads(
        &self,
        lead_ids: &[Uuid],
    ) -> Result<Vec<ConversionRecord>, ScoringError>;
}

/// Read-only assessment sessions
pub trait SessionStore: Send + Sync {
    fn query_sessions_by_lead(&self, lead_id: Uuid)
        -> Result<Vec<AssessmentSession>, ScoringError>;
}

/// Best-effort counter cache
pub trait ScoreCache: Send + Sync {
    /// Add `delta` to `key`, returning the new value
    fn increment(&self, key: &str, delta: i64) -> Result<i64, ScoringError>;
}

/// Cache key holding a lead's running score
pub fn lead_score_key(lead_id: Uuid) -> String {
    format!("lead_score:{lead_id}")
}

/// Cache key counting a lead's events of one type
pub fn lead_event_key(lead_id: Uuid, event_type: &str) -> String {
    format!("lead_event:{lead_id}:{event_type}")
}
