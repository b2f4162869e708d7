//! Conversion probability estimation
//!
//! Score band sets the base probability; specific high-intent signals and
//! activity spread multiply it, capped at 1.0.

use crate::types::ScoringEvent;
use std::collections::{BTreeMap, HashSet};

/// Active days above which activity spread earns a boost
const SPREAD_MIN_ACTIVE_DAYS: usize = 3;

/// Estimator for the 0-1 conversion probability
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionProbabilityEstimator;

impl ConversionProbabilityEstimator {
    /// Estimate conversion probability from the decayed score, per-type
    /// event counts and the underlying events
    pub fn estimate(
        &self,
        total_score: i64,
        event_counts: &BTreeMap<String, u32>,
        events: &[ScoringEvent],
    ) -> f64 {
        let seen = |event_type: &str| event_counts.get(event_type).copied().unwrap_or(0) > 0;

        let mut probability = base_probability(total_score);

        if seen("results_viewed") {
            probability *= 1.5;
        }
        if seen("pricing_viewed") {
            probability *= 1.3;
        }
        if seen("demo_requested") {
            probability *= 2.0;
        }
        if active_days(events) > SPREAD_MIN_ACTIVE_DAYS {
            probability *= 1.2;
        }

        probability.clamp(0.0, 1.0)
    }
}

/// Base probability by score band
pub fn base_probability(total_score: i64) -> f64 {
    match total_score {
        s if s >= 200 => 0.8,
        s if s >= 150 => 0.6,
        s if s >= 100 => 0.4,
        s if s >= 50 => 0.2,
        _ => 0.05,
    }
}

/// Distinct UTC calendar days with at least one event
pub fn active_days(events: &[ScoringEvent]) -> usize {
    events
        .iter()
        .map(|e| e.created_at.date_naive())
        .collect::<HashSet<_>>()
        .len()
}
