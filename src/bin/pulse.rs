//! Pulse CLI - Command-line interface for Lead Pulse
//!
//! Commands:
//! - score: Aggregate a lead's decayed score
//! - analytics: Windowed lead analytics and insights
//! - cohort: Cohort metrics over an acquisition window
//! - track: Record NDJSON track requests from stdin (streaming mode)
//! - rules: Print the effective scoring rule table

use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use lead_pulse::{
    EngineConfig, FixedClock, InMemoryStore, LeadScoringEngine, ScoringError, TrackEventRequest,
    PRODUCER_NAME, PULSE_VERSION,
};

/// Pulse - behavioral lead scoring and analytics
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Lead Pulse Contributors")]
#[command(version = PULSE_VERSION)]
#[command(about = "Score leads and analyze their behavior", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Leads to load (NDJSON)
    #[arg(long, global = true)]
    leads: Option<PathBuf>,

    /// Scoring events to load (NDJSON)
    #[arg(long, global = true)]
    events: Option<PathBuf>,

    /// Conversion records to load (NDJSON)
    #[arg(long, global = true)]
    conversions: Option<PathBuf>,

    /// Assessment sessions to load (NDJSON)
    #[arg(long, global = true)]
    sessions: Option<PathBuf>,

    /// Evaluate as of this instant (RFC 3339) instead of the wall clock
    #[arg(long, global = true)]
    as_of: Option<DateTime<Utc>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate a lead's decayed score
    Score {
        /// Lead ID
        #[arg(long)]
        lead: Uuid,
    },

    /// Windowed lead analytics and behavioral insights
    Analytics {
        /// Lead ID
        #[arg(long)]
        lead: Uuid,

        /// Trailing window in days
        #[arg(long, default_value = "30")]
        days: u32,
    },

    /// Cohort metrics for leads created inside a window
    Cohort {
        /// Window start (RFC 3339, inclusive)
        #[arg(long)]
        start: DateTime<Utc>,

        /// Window end (RFC 3339, inclusive)
        #[arg(long)]
        end: DateTime<Utc>,

        /// Cohort label: daily, weekly, monthly or custom
        #[arg(long, default_value = "custom")]
        cohort_type: String,
    },

    /// Record track requests read from stdin (streaming mode)
    Track {
        /// Save the full event log to file after processing
        #[arg(long)]
        save_events: Option<PathBuf>,

        /// Save updated leads to file after processing
        #[arg(long)]
        save_leads: Option<PathBuf>,

        /// Flush output after each record (`--flush false` to buffer)
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        flush: bool,
    },

    /// Print the effective scoring rule table
    Rules,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`)
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    let store = Arc::new(InMemoryStore::new());
    load_store(&store, &cli)?;

    let mut builder = LeadScoringEngine::in_memory(store.clone()).with_config(config);
    if let Some(as_of) = cli.as_of {
        builder = builder.with_clock(Arc::new(FixedClock(as_of)));
    }
    let engine = builder.build()?;

    match cli.command {
        Commands::Score { lead } => emit(&engine.calculate_lead_score(lead)?),

        Commands::Analytics { lead, days } => emit(&engine.get_lead_analytics(lead, days)?),

        Commands::Cohort {
            start,
            end,
            cohort_type,
        } => emit(&engine.get_cohort_analytics(start, end, &cohort_type)?),

        Commands::Track {
            save_events,
            save_leads,
            flush,
        } => cmd_track(
            &engine,
            &store,
            save_events.as_deref(),
            save_leads.as_deref(),
            flush,
        ),

        Commands::Rules => emit(&RulesReport {
            producer: PRODUCER_NAME,
            version: PULSE_VERSION,
            default_base_score: engine.rules().default_base_score(),
            rules: engine
                .rules()
                .iter()
                .map(|(event_type, rule)| RuleEntry {
                    event_type: event_type.clone(),
                    base_score: rule.base_score,
                    category: rule.category.as_str().to_string(),
                })
                .collect(),
        }),
    }
}

fn load_store(store: &InMemoryStore, cli: &Cli) -> Result<(), PulseCliError> {
    if let Some(path) = &cli.leads {
        let count = store.load_leads_ndjson(&fs::read_to_string(path)?)?;
        tracing::debug!(count, path = %path.display(), "loaded leads");
    }
    if let Some(path) = &cli.events {
        let count = store.load_events_ndjson(&fs::read_to_string(path)?)?;
        tracing::debug!(count, path = %path.display(), "loaded events");
    }
    if let Some(path) = &cli.conversions {
        let count = store.load_conversions_ndjson(&fs::read_to_string(path)?)?;
        tracing::debug!(count, path = %path.display(), "loaded conversions");
    }
    if let Some(path) = &cli.sessions {
        let count = store.load_sessions_ndjson(&fs::read_to_string(path)?)?;
        tracing::debug!(count, path = %path.display(), "loaded sessions");
    }
    Ok(())
}

fn cmd_track(
    engine: &LeadScoringEngine,
    store: &InMemoryStore,
    save_events: Option<&Path>,
    save_leads: Option<&Path>,
    flush: bool,
) -> Result<(), PulseCliError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut recorded = 0usize;

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let request: TrackEventRequest = serde_json::from_str(trimmed).map_err(|e| {
            PulseCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;

        let event = engine.track_event(request)?;
        writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        if flush {
            stdout.flush()?;
        }
        recorded += 1;
    }

    if recorded == 0 {
        return Err(PulseCliError::NoEvents);
    }

    if let Some(path) = save_events {
        fs::write(path, store.events_to_ndjson()?)?;
    }
    if let Some(path) = save_leads {
        fs::write(path, store.leads_to_ndjson()?)?;
    }

    Ok(())
}

/// Pretty JSON for a terminal, compact JSON for pipes
fn emit<T: Serialize>(value: &T) -> Result<(), PulseCliError> {
    let json = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

// Report types

#[derive(Serialize)]
struct RulesReport {
    producer: &'static str,
    version: &'static str,
    default_base_score: i64,
    rules: Vec<RuleEntry>,
}

#[derive(Serialize)]
struct RuleEntry {
    event_type: String,
    base_score: i64,
    category: String,
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Scoring(ScoringError),
    Json(serde_json::Error),
    NoEvents,
    ParseError(String),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<ScoringError> for PulseCliError {
    fn from(e: ScoringError) -> Self {
        PulseCliError::Scoring(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Scoring(e) => scoring_error(e),
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No track requests found on stdin".to_string(),
                hint: Some("Pipe one TrackEventRequest JSON object per line".to_string()),
            },
            PulseCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be a TrackEventRequest object".to_string()),
            },
        }
    }
}

fn scoring_error(e: ScoringError) -> CliError {
    let (code, hint) = match &e {
        ScoringError::NotFound { .. } => ("NOT_FOUND", "Check the ID and the --leads file"),
        ScoringError::Validation(_) => ("VALIDATION_ERROR", "Fix the input and retry"),
        ScoringError::TransientStore(_) => ("STORE_UNAVAILABLE", "Retry the command"),
        ScoringError::DegradedDependency(_) => ("DEPENDENCY_DEGRADED", "Retry the command"),
        ScoringError::Parse(_) => ("PARSE_ERROR", "Ensure data files are NDJSON records"),
        ScoringError::Json(_) => ("JSON_ERROR", "Check JSON syntax"),
        ScoringError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}
