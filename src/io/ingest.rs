//! JSON Lines ingestion with record cleaning
//!
//! Every reader accepts one JSON object per line. Records are validated once
//! here and converted into the typed domain records; anything malformed is
//! excluded and reported as a [`SkippedRecord`] instead of failing the run.
//! Only I/O failures on the file itself are errors.

use crate::domain::types::{
    parse_timestamp, AttendanceEvent, PaymentEvent, PersonId, PresenceRecord, Role, Session,
    Timestamp, TrackId, Zone,
};
use crate::infra::metrics::Metrics;
use anyhow::Context;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Why a single input record was excluded
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field `{0}`")]
    Missing(&'static str),
    #[error("unparsable timestamp in `{field}`: {value:?}")]
    Timestamp { field: &'static str, value: String },
    #[error("unparsable amount: {0:?}")]
    Amount(String),
    #[error("{0}")]
    Role(String),
    #[error("end_time {end} precedes start_time {start}")]
    EndBeforeStart { start: Timestamp, end: Timestamp },
}

/// An excluded input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    /// 1-based line number in the source file
    pub line: usize,
    pub reason: String,
}

/// Cleaned records plus the lines that were excluded
#[derive(Debug, Clone)]
pub struct Ingested<T> {
    pub records: Vec<T>,
    pub skipped: Vec<SkippedRecord>,
}

impl<T> Ingested<T> {
    fn empty() -> Self {
        Self { records: Vec::new(), skipped: Vec::new() }
    }
}

impl<T> Default for Ingested<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// One capture-side sighting, keyed by track until the history is finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sighting {
    pub track_id: TrackId,
    pub identity: Option<PersonId>,
    pub zone: Zone,
    pub timestamp: Timestamp,
}

/// Loosely typed scalar accepted for flag and amount columns
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawSighting {
    #[serde(default)]
    track_id: Option<i64>,
    #[serde(default, alias = "identity_id")]
    identity: Option<String>,
    zone: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    #[serde(default)]
    session_id: Option<String>,
    trainer_id: Option<String>,
    member_id: Option<String>,
    zone: Option<String>,
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAttendance {
    #[serde(default)]
    trainer_id: Option<String>,
    #[serde(default)]
    member_id: Option<String>,
    zone: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPresence {
    person_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
    zone: Option<String>,
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPayment {
    trainer_id: Option<String>,
    member_id: Option<String>,
    amount: Option<Scalar>,
    #[serde(default)]
    approved_by_gym: Option<Scalar>,
    timestamp: Option<String>,
}

fn required_id(raw: Option<&str>, field: &'static str) -> Result<PersonId, RecordError> {
    raw.and_then(PersonId::parse).ok_or(RecordError::Missing(field))
}

fn required_zone(raw: Option<&str>) -> Result<Zone, RecordError> {
    raw.and_then(Zone::parse).ok_or(RecordError::Missing("zone"))
}

fn required_timestamp(raw: Option<&str>, field: &'static str) -> Result<Timestamp, RecordError> {
    let raw = raw.ok_or(RecordError::Missing(field))?;
    parse_timestamp(raw).ok_or_else(|| RecordError::Timestamp { field, value: raw.to_string() })
}

/// Blank or absent means open; anything else must parse
fn optional_timestamp(
    raw: Option<&str>,
    field: &'static str,
) -> Result<Option<Timestamp>, RecordError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => required_timestamp(Some(value), field).map(Some),
    }
}

fn parse_amount(raw: Option<Scalar>) -> Result<f64, RecordError> {
    let amount = match raw.ok_or(RecordError::Missing("amount"))? {
        Scalar::Number(n) => n,
        Scalar::Text(s) => s.trim().parse::<f64>().map_err(|_| RecordError::Amount(s.clone()))?,
        Scalar::Bool(b) => return Err(RecordError::Amount(b.to_string())),
    };
    if !amount.is_finite() {
        return Err(RecordError::Amount(amount.to_string()));
    }
    Ok(amount)
}

/// Only an explicit affirmative approves a payment
fn parse_approval(raw: Option<Scalar>) -> bool {
    match raw {
        Some(Scalar::Bool(b)) => b,
        Some(Scalar::Number(n)) => n == 1.0,
        Some(Scalar::Text(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "yes" | "true" | "y" | "1")
        }
        None => false,
    }
}

pub fn parse_sighting(line: &str) -> Result<Sighting, RecordError> {
    let raw: RawSighting = serde_json::from_str(line)?;
    Ok(Sighting {
        // Untracked sightings share one log and keep file order
        track_id: TrackId(raw.track_id.unwrap_or(0)),
        identity: raw.identity.as_deref().and_then(PersonId::parse),
        zone: required_zone(raw.zone.as_deref())?,
        timestamp: required_timestamp(raw.timestamp.as_deref(), "timestamp")?,
    })
}

pub fn parse_session(line: &str) -> Result<Session, RecordError> {
    let raw: RawSession = serde_json::from_str(line)?;
    let start_time = required_timestamp(raw.start_time.as_deref(), "start_time")?;
    let end_time = optional_timestamp(raw.end_time.as_deref(), "end_time")?;
    if let Some(end) = end_time {
        if end < start_time {
            return Err(RecordError::EndBeforeStart { start: start_time, end });
        }
    }
    let session = Session::new(
        required_id(raw.trainer_id.as_deref(), "trainer_id")?,
        required_id(raw.member_id.as_deref(), "member_id")?,
        required_zone(raw.zone.as_deref())?,
        start_time,
        end_time,
    );
    Ok(match raw.session_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => session.with_session_id(id),
        _ => session,
    })
}

pub fn parse_attendance(line: &str) -> Result<AttendanceEvent, RecordError> {
    let raw: RawAttendance = serde_json::from_str(line)?;
    Ok(AttendanceEvent {
        trainer_id: raw.trainer_id.as_deref().and_then(PersonId::parse),
        member_id: raw.member_id.as_deref().and_then(PersonId::parse),
        zone: required_zone(raw.zone.as_deref())?,
        timestamp: required_timestamp(raw.timestamp.as_deref(), "timestamp")?,
    })
}

pub fn parse_presence(line: &str) -> Result<PresenceRecord, RecordError> {
    let raw: RawPresence = serde_json::from_str(line)?;
    let person_id = required_id(raw.person_id.as_deref(), "person_id")?;
    let role = match raw.role.as_deref().map(str::trim) {
        None | Some("") => Role::infer_from_id(&person_id),
        Some(role) => role.parse().map_err(RecordError::Role)?,
    };
    Ok(PresenceRecord {
        person_id,
        role,
        zone: required_zone(raw.zone.as_deref())?,
        timestamp: required_timestamp(raw.timestamp.as_deref(), "timestamp")?,
    })
}

pub fn parse_payment(line: &str) -> Result<PaymentEvent, RecordError> {
    let raw: RawPayment = serde_json::from_str(line)?;
    Ok(PaymentEvent {
        trainer_id: required_id(raw.trainer_id.as_deref(), "trainer_id")?,
        member_id: raw.member_id.as_deref().and_then(PersonId::parse),
        amount: parse_amount(raw.amount)?,
        approved_by_gym: parse_approval(raw.approved_by_gym),
        timestamp: required_timestamp(raw.timestamp.as_deref(), "timestamp")?,
    })
}

/// Read JSON Lines from any reader, cleaning each record with `parse`.
///
/// Blank lines are ignored. `source` only labels log events.
pub fn read_jsonl<R, T, F>(
    reader: R,
    source: &str,
    parse: F,
    metrics: Option<&Metrics>,
) -> anyhow::Result<Ingested<T>>
where
    R: BufRead,
    F: Fn(&str) -> Result<T, RecordError>,
{
    let mut ingested = Ingested::empty();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {} of {}", index + 1, source))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse(line) {
            Ok(record) => ingested.records.push(record),
            Err(e) => {
                warn!(source = %source, line = %(index + 1), reason = %e, "record_skipped");
                ingested.skipped.push(SkippedRecord { line: index + 1, reason: e.to_string() });
            }
        }
    }

    if let Some(metrics) = metrics {
        metrics.record_skipped(ingested.skipped.len() as u64);
    }
    info!(
        source = %source,
        records = %ingested.records.len(),
        skipped = %ingested.skipped.len(),
        "input_ingested"
    );
    Ok(ingested)
}

fn read_file<T, F>(path: &Path, parse: F, metrics: Option<&Metrics>) -> anyhow::Result<Ingested<T>>
where
    F: Fn(&str) -> Result<T, RecordError>,
{
    let file =
        File::open(path).with_context(|| format!("failed to open input {}", path.display()))?;
    read_jsonl(BufReader::new(file), &path.display().to_string(), parse, metrics)
}

pub fn read_sightings(path: &Path, metrics: Option<&Metrics>) -> anyhow::Result<Ingested<Sighting>> {
    read_file(path, parse_sighting, metrics)
}

pub fn read_sessions(path: &Path, metrics: Option<&Metrics>) -> anyhow::Result<Ingested<Session>> {
    read_file(path, parse_session, metrics)
}

pub fn read_attendance(
    path: &Path,
    metrics: Option<&Metrics>,
) -> anyhow::Result<Ingested<AttendanceEvent>> {
    read_file(path, parse_attendance, metrics)
}

pub fn read_presence(
    path: &Path,
    metrics: Option<&Metrics>,
) -> anyhow::Result<Ingested<PresenceRecord>> {
    read_file(path, parse_presence, metrics)
}

pub fn read_payments(
    path: &Path,
    metrics: Option<&Metrics>,
) -> anyhow::Result<Ingested<PaymentEvent>> {
    read_file(path, parse_payment, metrics)
}
