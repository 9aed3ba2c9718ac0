//! Unauthorized extra service and unauthorized interaction detection
//!
//! Both rules flag attendance that no booking covers within the tolerance
//! window. Extra service requires the booking to be in the same zone;
//! interaction accepts a booking in any zone. The rules are independent, so
//! one attendance event can raise both.

use crate::domain::types::{AttendanceEvent, PersonId};
use crate::domain::violation::{Violation, ViolationType};
use crate::services::rules::coverage::CoverageIndex;

pub const EXTRA_SERVICE_DETAILS: &str = "Zone not booked or outside official session time";
pub const INTERACTION_DETAILS: &str =
    "Trainer interacted with member outside any official session";

/// Attendance with no same-zone booking covering it
pub fn detect_extra_services(
    index: &CoverageIndex<'_>,
    attendance: &[AttendanceEvent],
) -> Vec<Violation> {
    attendance
        .iter()
        .filter_map(|event| {
            let (trainer_id, member_id) = event.pair()?;
            if index.covered_in_zone(trainer_id, member_id, &event.zone, event.timestamp) {
                return None;
            }
            Some(uncovered(
                (trainer_id, member_id),
                event,
                ViolationType::UnauthorizedExtraService,
                EXTRA_SERVICE_DETAILS,
            ))
        })
        .collect()
}

/// Attendance with no booking of the pair covering it, whatever the zone
pub fn detect_interactions(
    index: &CoverageIndex<'_>,
    attendance: &[AttendanceEvent],
) -> Vec<Violation> {
    attendance
        .iter()
        .filter_map(|event| {
            let (trainer_id, member_id) = event.pair()?;
            if index.covered_any_zone(trainer_id, member_id, event.timestamp) {
                return None;
            }
            Some(uncovered(
                (trainer_id, member_id),
                event,
                ViolationType::UnauthorizedInteraction,
                INTERACTION_DETAILS,
            ))
        })
        .collect()
}

fn uncovered(
    (trainer_id, member_id): (&PersonId, &PersonId),
    event: &AttendanceEvent,
    violation_type: ViolationType,
    details: &str,
) -> Violation {
    Violation {
        trainer_id: trainer_id.clone(),
        member_id: Some(member_id.clone()),
        zone: Some(event.zone.clone()),
        violation_type,
        official_start_time: None,
        official_end_time: None,
        timestamp: event.timestamp,
        overtime_minutes: None,
        details: details.to_string(),
    }
}
