//! Read-side analytics
//!
//! Everything here derives results from stored history. Nothing in this
//! module writes to a store.

pub mod aggregator;
pub mod cohort;
pub mod engagement;
pub mod insights;
pub mod probability;
pub mod types;

pub use aggregator::{decay_factor, decayed_contribution, ScoreAggregator};
pub use cohort::{CohortAnalyzer, DEFAULT_COHORT_CHUNK_SIZE};
pub use engagement::EngagementAnalyzer;
pub use insights::{derive_insights, LeadAnalyzer};
pub use probability::ConversionProbabilityEstimator;
pub use types::*;
