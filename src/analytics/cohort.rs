//! Cohort analytics
//!
//! Aggregates engagement, conversion, status distribution and weekly
//! retention over every lead created inside an acquisition window. Leads
//! are fetched once and then walked in fixed-size chunks.

use crate::analytics::types::{
    AcquisitionPeriod, CohortConversions, CohortEngagement, CohortMetrics, CohortType,
    WeeklyRetention,
};
use crate::clock::Clock;
use crate::error::ScoringError;
use crate::store::{ConversionStore, EventOrder, EventStore, LeadStore};
use crate::types::{ConversionRecord, Lead, LeadStatus};
use chrono::{DateTime, Datelike, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_COHORT_CHUNK_SIZE: usize = 500;

/// ISO weeks reported in retention analysis
const RETENTION_WEEKS: std::ops::RangeInclusive<u32> = 1..=52;

/// Computes cohort metrics over the lead, event and conversion stores
pub struct CohortAnalyzer {
    leads: Arc<dyn LeadStore>,
    events: Arc<dyn EventStore>,
    conversions: Option<Arc<dyn ConversionStore>>,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
}

/// Running totals while walking the cohort
#[derive(Default)]
struct Accumulator {
    engagement: CohortEngagement,
    distribution: BTreeMap<LeadStatus, u32>,
    /// ISO week -> leads with at least one event that week
    weekly_active: BTreeMap<u32, u32>,
    conversions: Vec<ConversionRecord>,
    /// Set once the conversion store has failed
    conversions_degraded: bool,
}

impl CohortAnalyzer {
    pub fn new(leads: Arc<dyn LeadStore>, events: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            leads,
            events,
            conversions: None,
            clock,
            chunk_size: DEFAULT_COHORT_CHUNK_SIZE,
        }
    }

    pub fn with_conversions(mut self, conversions: Arc<dyn ConversionStore>) -> Self {
        self.conversions = Some(conversions);
        self
    }

    /// Leads per event/conversion fetch batch; zero is treated as one
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn cohort_metrics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cohort_type: &str,
    ) -> Result<CohortMetrics, ScoringError> {
        if start > end {
            return Err(ScoringError::Validation(format!(
                "cohort start {start} is after end {end}"
            )));
        }

        let now = self.clock.now();
        let period = AcquisitionPeriod {
            start,
            end,
            cohort_type: CohortType::parse(cohort_type),
        };

        let leads = self
            .leads
            .query_leads_created_between(start, end)
            .map_err(abort)?;

        if leads.is_empty() {
            return Ok(CohortMetrics {
                cohort_size: 0,
                acquisition_period: period,
                engagement_metrics: CohortEngagement::default(),
                conversion_metrics: CohortConversions::default(),
                lead_distribution: empty_distribution(),
                retention_analysis: Vec::new(),
                message: Some(format!("No leads were created between {start} and {end}")),
                computed_at: now,
            });
        }

        let mut acc = Accumulator {
            distribution: empty_distribution(),
            ..Default::default()
        };
        for chunk in leads.chunks(self.chunk_size) {
            self.accumulate_chunk(chunk, &mut acc)?;
        }

        let cohort_size = leads.len() as u32;
        let engagement_metrics = finish_engagement(acc.engagement, cohort_size);
        let conversion_metrics = conversion_metrics(&leads, &acc.conversions, cohort_size);
        let retention_analysis = RETENTION_WEEKS
            .map(|week| {
                let active = acc.weekly_active.get(&week).copied().unwrap_or(0);
                WeeklyRetention {
                    week,
                    active_leads: active,
                    retention_rate: active as f64 / cohort_size as f64,
                }
            })
            .collect();

        tracing::info!(
            cohort_size,
            cohort_type = ?period.cohort_type,
            active_leads = engagement_metrics.active_leads,
            conversions = conversion_metrics.total_conversions,
            conversions_degraded = acc.conversions_degraded,
            "computed cohort metrics"
        );

        Ok(CohortMetrics {
            cohort_size,
            acquisition_period: period,
            engagement_metrics,
            conversion_metrics,
            lead_distribution: acc.distribution,
            retention_analysis,
            message: None,
            computed_at: now,
        })
    }

    fn accumulate_chunk(&self, chunk: &[Lead], acc: &mut Accumulator) -> Result<(), ScoringError> {
        for lead in chunk {
            *acc.distribution.entry(lead.lead_status).or_insert(0) += 1;

            let events = self
                .events
                .query_events_by_lead(lead.id, EventOrder::OldestFirst)
                .map_err(abort)?;
            if events.is_empty() {
                continue;
            }

            let engagement = &mut acc.engagement;
            engagement.active_leads += 1;
            engagement.total_events += events.len() as u32;
            for event in &events {
                match event.event_type.as_str() {
                    "assessment_start" => engagement.assessment_starts += 1,
                    "assessment_complete" => engagement.assessment_completions += 1,
                    _ => {}
                }
            }

            let weeks: HashSet<u32> = events.iter().map(|e| e.created_at.iso_week().week()).collect();
            for week in weeks {
                *acc.weekly_active.entry(week).or_insert(0) += 1;
            }
        }

        if acc.conversions_degraded {
            return Ok(());
        }
        if let Some(store) = &self.conversions {
            let ids: Vec<Uuid> = chunk.iter().map(|l| l.id).collect();
            match store.query_conversions_by_leads(&ids) {
                Ok(records) => acc.conversions.extend(records),
                Err(e) => {
                    tracing::warn!(error = %e, "conversion store unavailable, reporting no conversions");
                    acc.conversions.clear();
                    acc.conversions_degraded = true;
                }
            }
        }
        Ok(())
    }
}

/// Lead and event failures abort the computation and are reported as retryable
fn abort(err: ScoringError) -> ScoringError {
    if err.is_retryable() {
        err
    } else {
        ScoringError::TransientStore(format!("cohort computation aborted: {err}"))
    }
}

fn empty_distribution() -> BTreeMap<LeadStatus, u32> {
    LeadStatus::ALL.iter().map(|s| (*s, 0)).collect()
}

fn finish_engagement(mut engagement: CohortEngagement, cohort_size: u32) -> CohortEngagement {
    engagement.avg_events_per_lead = engagement.total_events as f64 / cohort_size as f64;
    engagement
}

fn conversion_metrics(
    leads: &[Lead],
    conversions: &[ConversionRecord],
    cohort_size: u32,
) -> CohortConversions {
    let created: HashMap<Uuid, DateTime<Utc>> = leads.iter().map(|l| (l.id, l.created_at)).collect();

    let mut conversions_by_type = BTreeMap::new();
    let mut total_hours = 0.0;
    let mut timed = 0u32;
    for record in conversions {
        *conversions_by_type
            .entry(record.conversion_type.clone())
            .or_insert(0) += 1;
        if let Some(created_at) = created.get(&record.lead_id) {
            total_hours += (record.converted_at - *created_at).num_seconds() as f64 / 3600.0;
            timed += 1;
        }
    }

    let total_conversions = conversions.len() as u32;
    CohortConversions {
        total_conversions,
        conversion_rate: total_conversions as f64 / cohort_size as f64,
        avg_hours_to_conversion: if timed == 0 {
            0.0
        } else {
            total_hours / timed as f64
        },
        conversions_by_type,
    }
}
