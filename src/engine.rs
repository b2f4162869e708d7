//! Engine facade
//!
//! `LeadScoringEngine` wires the recorder and the analytics components to a
//! shared set of stores, a clock and a configuration, and exposes the four
//! public operations.

use crate::analytics::{
    CohortAnalyzer, CohortMetrics, LeadAnalytics, LeadAnalyzer, LeadScoreResult, ScoreAggregator,
};
use crate::calculator::EventScoreCalculator;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::ScoringError;
use crate::recorder::{EventRecorder, TrackEventRequest, TransitionHook};
use crate::rules::ScoringRuleTable;
use crate::store::{
    ConversionStore, EventStore, InMemoryStore, LeadStore, ScoreCache, SessionStore,
};
use crate::types::ScoringEvent;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Lead scoring and analytics over injected stores
pub struct LeadScoringEngine {
    config: EngineConfig,
    recorder: EventRecorder,
    aggregator: ScoreAggregator,
    analyzer: LeadAnalyzer,
    cohorts: CohortAnalyzer,
}

impl LeadScoringEngine {
    /// Start building an engine over the two required stores
    pub fn builder(leads: Arc<dyn LeadStore>, events: Arc<dyn EventStore>) -> EngineBuilder {
        EngineBuilder {
            leads,
            events,
            conversions: None,
            sessions: None,
            cache: None,
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
            on_transition: None,
        }
    }

    /// Builder with every store backed by one in-memory store
    pub fn in_memory(store: Arc<InMemoryStore>) -> EngineBuilder {
        Self::builder(store.clone(), store.clone())
            .with_conversions(store.clone())
            .with_sessions(store)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Effective rule table used to score events
    pub fn rules(&self) -> &ScoringRuleTable {
        self.recorder.calculator().rules()
    }

    /// Record an interaction and apply its impact to the lead
    pub fn track_event(&self, request: TrackEventRequest) -> Result<ScoringEvent, ScoringError> {
        self.recorder.track_event(request)
    }

    /// Authoritative decayed score for a lead
    pub fn calculate_lead_score(&self, lead_id: Uuid) -> Result<LeadScoreResult, ScoringError> {
        self.aggregator.calculate_lead_score(lead_id)
    }

    pub fn get_lead_analytics(
        &self,
        lead_id: Uuid,
        days_back: u32,
    ) -> Result<LeadAnalytics, ScoringError> {
        self.analyzer.get_lead_analytics(lead_id, days_back)
    }

    pub fn get_cohort_analytics(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cohort_type: &str,
    ) -> Result<CohortMetrics, ScoringError> {
        self.cohorts.cohort_metrics(start, end, cohort_type)
    }
}

/// Builder for [`LeadScoringEngine`]
pub struct EngineBuilder {
    leads: Arc<dyn LeadStore>,
    events: Arc<dyn EventStore>,
    conversions: Option<Arc<dyn ConversionStore>>,
    sessions: Option<Arc<dyn SessionStore>>,
    cache: Option<Arc<dyn ScoreCache>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    on_transition: Option<TransitionHook>,
}

impl EngineBuilder {
    pub fn with_conversions(mut self, conversions: Arc<dyn ConversionStore>) -> Self {
        self.conversions = Some(conversions);
        self
    }

    pub fn with_sessions(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ScoreCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_status_change(mut self, hook: TransitionHook) -> Self {
        self.on_transition = Some(hook);
        self
    }

    /// Validate the configuration and assemble the engine
    pub fn build(self) -> Result<LeadScoringEngine, ScoringError> {
        self.config.validate()?;

        let calculator = EventScoreCalculator::new(self.config.rule_table());
        let mut recorder = EventRecorder::new(calculator, self.leads.clone(), self.events.clone())
            .with_clock(self.clock.clone())
            .with_config(self.config.recorder_config());
        if let Some(cache) = self.cache {
            recorder = recorder.with_cache(cache);
        }
        if let Some(hook) = self.on_transition {
            recorder = recorder.on_status_change(hook);
        }

        let aggregator = ScoreAggregator::new(self.events.clone(), self.clock.clone());

        let mut analyzer =
            LeadAnalyzer::new(self.leads.clone(), self.events.clone(), self.clock.clone());
        if let Some(sessions) = self.sessions {
            analyzer = analyzer.with_sessions(sessions);
        }

        let mut cohorts = CohortAnalyzer::new(self.leads, self.events, self.clock)
            .with_chunk_size(self.config.cohort_chunk_size);
        if let Some(conversions) = self.conversions {
            cohorts = cohorts.with_conversions(conversions);
        }

        tracing::debug!(
            rules = recorder.calculator().rules().len(),
            reject_orphan_events = self.config.reject_orphan_events,
            cohort_chunk_size = cohorts.chunk_size(),
            "built lead scoring engine"
        );

        Ok(LeadScoringEngine {
            config: self.config,
            recorder,
            aggregator,
            analyzer,
            cohorts,
        })
    }
}
