//! Domain models - typed records shared by every stage of the pipeline
//!
//! This module contains the canonical data types used throughout the system:
//! - `Observation` - one sighting of a resolved identity in a zone
//! - `Session` - booked or inferred trainer/member session
//! - `PresenceRecord` / `AttendanceEvent` - per-person and paired attendance
//! - `PaymentEvent` - member to trainer payment
//! - `Violation` - a policy finding

pub mod types;
pub mod violation;

// Re-export commonly used types at module level
pub use types::{
    AttendanceEvent, Observation, PaymentEvent, PersonId, PresenceRecord, Role, Session,
    Timestamp, TrackId, TrackedIdentity, Zone,
};
pub use violation::{Violation, ViolationType};
