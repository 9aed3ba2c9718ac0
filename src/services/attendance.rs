//! Attendance pairing
//!
//! The capture side logs one presence record per detected person per frame.
//! Every trainer and member seen in the same zone at the same instant form an
//! attendance pair for the rule engine.

use crate::domain::types::{AttendanceEvent, PersonId, PresenceRecord, Role, Timestamp, Zone};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use tracing::debug;

/// People of one role seen in a single frame; usually a handful
type RoleBucket<'a> = SmallVec<[&'a PersonId; 4]>;

/// Pair co-timed trainer and member presence records into attendance events.
///
/// Output is ordered by timestamp, zone, trainer id, member id. Duplicate
/// detections of one person in the same frame count once.
pub fn pair_presence(records: &[PresenceRecord]) -> Vec<AttendanceEvent> {
    let mut frames: BTreeMap<(Timestamp, &Zone), (RoleBucket<'_>, RoleBucket<'_>)> =
        BTreeMap::new();

    for record in records {
        let (trainers, members) = frames.entry((record.timestamp, &record.zone)).or_default();
        let bucket = match record.role {
            Role::Trainer => trainers,
            Role::Member => members,
        };
        if !bucket.contains(&&record.person_id) {
            bucket.push(&record.person_id);
        }
    }

    let mut events = Vec::new();
    for ((timestamp, zone), (mut trainers, mut members)) in frames {
        if trainers.is_empty() || members.is_empty() {
            continue;
        }
        trainers.sort();
        members.sort();
        for trainer_id in &trainers {
            for member_id in &members {
                events.push(AttendanceEvent::new(
                    (*trainer_id).clone(),
                    (*member_id).clone(),
                    zone.clone(),
                    timestamp,
                ));
            }
        }
    }

    debug!(presence = %records.len(), attendance = %events.len(), "presence_paired");
    events
}
