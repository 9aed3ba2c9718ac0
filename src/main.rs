//! gym-monitor - trainer/member session inference and violation detection
//!
//! Batch CLI over JSON Lines inputs:
//! - `infer`  - identity sightings -> inferred sessions (JSONL)
//! - `detect` - booked sessions + attendance + payments -> violations (CSV/JSONL)
//! - `run`    - both stages in one pass
//!
//! Module structure:
//! - `domain/` - Core record types (Session, AttendanceEvent, Violation)
//! - `io/` - External interfaces (JSONL ingestion, file egress)
//! - `services/` - Business logic (HistoryBuilder, SessionBuilder, ViolationEngine)
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gym_monitor::domain::{AttendanceEvent, PaymentEvent, PersonId, Session};
use gym_monitor::infra::{Config, Metrics};
use gym_monitor::io::{ingest, Egress};
use gym_monitor::services::{
    pair_presence, HistoryBuilder, IdentityHistory, SessionBuilder, ViolationEngine,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Gym monitor - session inference and policy violation detection
#[derive(Parser, Debug)]
#[command(name = "gym-monitor", version, about)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml", global = true)]
    config: String,

    /// Emit log events as JSON lines
    #[arg(long, env = "LOG_JSON", global = true)]
    log_json: bool,

    /// Override policy.min_session_seconds
    #[arg(long, global = true)]
    min_session_seconds: Option<i64>,

    /// Override policy.max_session_gap_seconds
    #[arg(long, global = true)]
    max_session_gap_seconds: Option<i64>,

    /// Override policy.tolerance_minutes
    #[arg(long, global = true)]
    tolerance_minutes: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Infer trainer/member sessions from identity sightings
    Infer(InferArgs),
    /// Evaluate violation rules against booked sessions
    Detect(DetectArgs),
    /// Infer sessions, then evaluate violation rules
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct InferArgs {
    /// Sightings JSONL (track_id, identity, zone, timestamp)
    #[arg(long)]
    observations: PathBuf,

    /// Sessions output (defaults to egress.sessions_file)
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DetectArgs {
    /// Booked sessions JSONL
    #[arg(long)]
    sessions: PathBuf,

    /// Paired attendance JSONL (trainer_id, member_id, zone, timestamp)
    #[arg(long)]
    attendance: Option<PathBuf>,

    /// Per-person presence JSONL, paired into attendance by frame
    #[arg(long)]
    presence: Option<PathBuf>,

    /// Payments JSONL
    #[arg(long)]
    payments: Option<PathBuf>,

    /// Violations CSV output (defaults to egress.violations_file)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write violations as JSONL
    #[arg(long)]
    jsonl: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Sightings JSONL
    #[arg(long)]
    observations: PathBuf,

    /// Per-person presence JSONL
    #[arg(long)]
    presence: PathBuf,

    /// Payments JSONL
    #[arg(long)]
    payments: PathBuf,

    /// Booked sessions JSONL; inferred sessions are evaluated when omitted
    #[arg(long)]
    booked: Option<PathBuf>,

    /// Sessions output (defaults to egress.sessions_file)
    #[arg(long)]
    sessions_out: Option<PathBuf>,

    /// Violations CSV output (defaults to egress.violations_file)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also write violations as JSONL
    #[arg(long)]
    jsonl: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-window and per-skip detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config = Config::load_from_path(&cli.config)?;
    let policy = config
        .policy()
        .with_overrides(cli.min_session_seconds, cli.max_session_gap_seconds, cli.tolerance_minutes)
        .context("Invalid policy override")?;
    let config = config.with_policy(policy);

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        min_session_seconds = %policy.min_session_seconds(),
        max_session_gap_seconds = %policy.max_session_gap_seconds(),
        tolerance_minutes = %policy.tolerance_minutes(),
        trainers = %config.trainers().len(),
        members = %config.members().len(),
        "config_loaded"
    );

    let metrics = Arc::new(Metrics::new());

    let result = match cli.command {
        Command::Infer(args) => infer(&config, &metrics, args),
        Command::Detect(args) => detect(&config, &metrics, args),
        Command::Run(args) => run(&config, &metrics, args),
    };

    // Summary is logged even when the command failed part way
    metrics.report().log();
    result
}

fn infer(config: &Config, metrics: &Arc<Metrics>, args: InferArgs) -> anyhow::Result<()> {
    let sessions = infer_sessions(config, metrics, &args.observations)?;
    let out = output_path(args.out, config.sessions_file());
    Egress::new(out).write_sessions(&sessions)?;
    Ok(())
}

fn detect(config: &Config, metrics: &Arc<Metrics>, args: DetectArgs) -> anyhow::Result<()> {
    let sessions = ingest::read_sessions(&args.sessions, Some(metrics.as_ref()))?.records;

    let mut attendance = match &args.attendance {
        Some(path) => ingest::read_attendance(path, Some(metrics.as_ref()))?.records,
        None => Vec::new(),
    };
    if let Some(path) = &args.presence {
        attendance.extend(load_paired_presence(path, metrics)?);
    }
    let payments = match &args.payments {
        Some(path) => ingest::read_payments(path, Some(metrics.as_ref()))?.records,
        None => Vec::new(),
    };

    evaluate_and_write(config, metrics, &sessions, &attendance, &payments, args.out, args.jsonl)
}

fn run(config: &Config, metrics: &Arc<Metrics>, args: RunArgs) -> anyhow::Result<()> {
    let inferred = infer_sessions(config, metrics, &args.observations)?;
    let sessions_out = output_path(args.sessions_out, config.sessions_file());
    Egress::new(sessions_out).write_sessions(&inferred)?;

    let sessions: Vec<Session> = match &args.booked {
        Some(path) => ingest::read_sessions(path, Some(metrics.as_ref()))?.records,
        None => inferred,
    };
    let attendance = load_paired_presence(&args.presence, metrics)?;
    let payments = ingest::read_payments(&args.payments, Some(metrics.as_ref()))?.records;

    evaluate_and_write(config, metrics, &sessions, &attendance, &payments, args.out, args.jsonl)
}

fn infer_sessions(
    config: &Config,
    metrics: &Arc<Metrics>,
    observations: &Path,
) -> anyhow::Result<Vec<Session>> {
    let sightings = ingest::read_sightings(observations, Some(metrics.as_ref()))?;
    let mut builder = HistoryBuilder::with_metrics(metrics.clone());
    for sighting in sightings.records {
        builder.record(sighting.track_id, sighting.identity, sighting.timestamp, sighting.zone);
    }
    let history = builder.finish();

    let (trainers, members) = roster(config, &history);
    let engine = SessionBuilder::with_metrics(config.policy(), metrics.clone());
    Ok(engine.infer(&history, &trainers, &members))
}

/// Configured roster, or every known identity split by id convention
fn roster(config: &Config, history: &IdentityHistory) -> (Vec<PersonId>, Vec<PersonId>) {
    if config.trainers().is_empty() && config.members().is_empty() {
        warn!(identities = %history.len(), "roster_empty_using_id_prefix");
        return history.roster_by_id_prefix();
    }
    (config.trainers().to_vec(), config.members().to_vec())
}

fn load_paired_presence(
    path: &Path,
    metrics: &Arc<Metrics>,
) -> anyhow::Result<Vec<AttendanceEvent>> {
    let presence = ingest::read_presence(path, Some(metrics.as_ref()))?;
    Ok(pair_presence(&presence.records))
}

fn evaluate_and_write(
    config: &Config,
    metrics: &Arc<Metrics>,
    sessions: &[Session],
    attendance: &[AttendanceEvent],
    payments: &[PaymentEvent],
    out: Option<PathBuf>,
    jsonl: Option<PathBuf>,
) -> anyhow::Result<()> {
    let engine = ViolationEngine::with_metrics(config.policy(), metrics.clone());
    let report = engine.evaluate(sessions, attendance, payments);

    let out = output_path(out, config.violations_file());
    Egress::new(out).write_violations_csv(&report.violations)?;
    if let Some(path) = jsonl {
        Egress::new(path).write_violations_jsonl(&report.violations)?;
    }

    info!(
        violations = %report.violations.len(),
        unique = %report.unique_count(),
        status = ?report.status,
        "detection_complete"
    );
    Ok(())
}

fn output_path(explicit: Option<PathBuf>, configured: &str) -> PathBuf {
    explicit.unwrap_or_else(|| PathBuf::from(configured))
}
