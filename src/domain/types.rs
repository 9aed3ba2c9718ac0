//! Shared record types for the gym monitor

use chrono::{DateTime, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparable instant used by every record. Arithmetic is done in whole seconds.
pub type Timestamp = NaiveDateTime;

/// Format used when rendering timestamps into tabular output
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive layouts accepted on input, tried in order after RFC 3339
const NAIVE_FORMATS: [&str; 4] =
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];

/// Parse a timestamp from any of the accepted input layouts.
///
/// RFC 3339 values carrying an offset are converted to naive UTC.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    NAIVE_FORMATS.iter().find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

/// Render a timestamp the way tabular egress expects it
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Newtype wrapper for ephemeral capture track IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct TrackId(pub i64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for trainer and member identifiers.
///
/// Always trimmed and never blank once constructed through [`PersonId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PersonId {
    fn from(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Named area of the gym covered by a camera (e.g. `GYM_FLOOR`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Zone(String);

impl Zone {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Zone {
    fn from(raw: &str) -> Self {
        Self(raw.trim().to_string())
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role of a person seen by the capture side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trainer,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Trainer => "trainer",
            Role::Member => "member",
        }
    }

    /// Capture-side convention: trainer ids start with `T`
    pub fn infer_from_id(id: &PersonId) -> Self {
        if id.as_str().starts_with('T') {
            Role::Trainer
        } else {
            Role::Member
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trainer" => Ok(Role::Trainer),
            "member" => Ok(Role::Member),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// One sighting of a resolved identity in a zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub identity: PersonId,
    pub timestamp: Timestamp,
    pub zone: Zone,
}

impl Observation {
    pub fn new(identity: PersonId, timestamp: Timestamp, zone: Zone) -> Self {
        Self { identity, timestamp, zone }
    }
}

/// One tracked object in one capture frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedIdentity {
    pub track_id: TrackId,
    /// Resolved identity, if recognition succeeded for this frame
    pub identity: Option<PersonId>,
}

/// Booked or inferred trainer/member session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub trainer_id: PersonId,
    pub member_id: PersonId,
    pub zone: Zone,
    pub start_time: Timestamp,
    /// Absent for open bookings; always set on inferred sessions
    #[serde(default)]
    pub end_time: Option<Timestamp>,
}

impl Session {
    pub fn new(
        trainer_id: PersonId,
        member_id: PersonId,
        zone: Zone,
        start_time: Timestamp,
        end_time: Option<Timestamp>,
    ) -> Self {
        Self { session_id: None, trainer_id, member_id, zone, start_time, end_time }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    #[inline]
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    /// True when `ts` falls in `[start_time, end_time + tolerance]`.
    /// A session without an end time covers nothing.
    #[inline]
    pub fn covers(&self, ts: Timestamp, tolerance: Duration) -> bool {
        let Some(end) = self.end_time else {
            return false;
        };
        // A tolerance past the calendar range leaves the window open-ended
        self.start_time <= ts && end.checked_add_signed(tolerance).map_or(true, |limit| ts <= limit)
    }
}

/// Per-person presence record as logged by the capture side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub person_id: PersonId,
    pub role: Role,
    pub zone: Zone,
    pub timestamp: Timestamp,
}

/// Trainer/member attendance consumed by the rule engine.
///
/// Ids are optional: sparse rows are legal and simply never match a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    #[serde(default)]
    pub trainer_id: Option<PersonId>,
    #[serde(default)]
    pub member_id: Option<PersonId>,
    pub zone: Zone,
    pub timestamp: Timestamp,
}

impl AttendanceEvent {
    pub fn new(trainer_id: PersonId, member_id: PersonId, zone: Zone, timestamp: Timestamp) -> Self {
        Self { trainer_id: Some(trainer_id), member_id: Some(member_id), zone, timestamp }
    }

    /// Both join keys, or None when either is missing
    #[inline]
    pub fn pair(&self) -> Option<(&PersonId, &PersonId)> {
        Some((self.trainer_id.as_ref()?, self.member_id.as_ref()?))
    }
}

/// Payment from a member to a trainer. The payer may be unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub trainer_id: PersonId,
    #[serde(default)]
    pub member_id: Option<PersonId>,
    pub amount: f64,
    pub approved_by_gym: bool,
    pub timestamp: Timestamp,
}
