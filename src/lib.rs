//! Lead Pulse - behavioral lead scoring and analytics engine
//!
//! Pulse turns a stream of lead interactions into scores and analytics:
//! event scoring → per-lead recording → decayed aggregation → probability,
//! engagement, journey and cohort analytics.
//!
//! ## Modules
//!
//! - **Write path**: `rules`, `calculator` and `recorder` score and record events
//! - **Read path**: `analytics` recomputes scores and derives insights from history
//! - **Storage**: `store` defines the collaborator traits and an in-memory backend

pub mod analytics;
pub mod calculator;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod recorder;
pub mod rules;
pub mod store;
pub mod types;

pub use analytics::{CohortMetrics, LeadAnalytics, LeadScoreResult};
pub use calculator::{EventScoreCalculator, ScoreModifiers};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{EngineBuilder, LeadScoringEngine};
pub use error::{ErrorClass, ScoringError};
pub use recorder::{EventRecorder, StatusTransition, TrackEventRequest};
pub use rules::{ScoringRule, ScoringRuleTable};
pub use store::{InMemoryScoreCache, InMemoryStore};
pub use types::{EventCategory, Lead, LeadStatus, ScoringEvent};

/// Pulse version reported by the CLI
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "lead-pulse";
