//! Extended session detection
//!
//! A booked session is extended when the pair's last attendance in the booked
//! zone falls at least `tolerance_minutes` after the official end.

use crate::domain::types::{AttendanceEvent, PersonId, Session, Timestamp, Zone};
use crate::domain::violation::{round_hundredths, Violation, ViolationType};
use crate::infra::metrics::Metrics;
use rustc_hash::FxHashMap;
use tracing::debug;

pub const DETAILS: &str = "Trainer extended session beyond official end time";

pub fn detect(
    sessions: &[Session],
    attendance: &[AttendanceEvent],
    tolerance_minutes: i64,
    metrics: Option<&Metrics>,
) -> Vec<Violation> {
    // Last attendance per (trainer, member, zone)
    let mut last_seen: FxHashMap<(&PersonId, &PersonId, &Zone), Timestamp> = FxHashMap::default();
    for event in attendance {
        let Some((trainer_id, member_id)) = event.pair() else {
            continue;
        };
        last_seen
            .entry((trainer_id, member_id, &event.zone))
            .and_modify(|last| *last = (*last).max(event.timestamp))
            .or_insert(event.timestamp);
    }

    let mut violations = Vec::new();
    for session in sessions {
        let Some(end_time) = session.end_time else {
            continue;
        };
        let key = (&session.trainer_id, &session.member_id, &session.zone);
        let Some(&actual_last) = last_seen.get(&key) else {
            debug!(
                trainer_id = %session.trainer_id,
                member_id = %session.member_id,
                zone = %session.zone,
                "booked_session_without_attendance"
            );
            if let Some(metrics) = metrics {
                metrics.record_uncorroborated_session();
            }
            continue;
        };

        let overtime_minutes = (actual_last - end_time).num_seconds() as f64 / 60.0;
        if overtime_minutes >= tolerance_minutes as f64 {
            violations.push(Violation {
                trainer_id: session.trainer_id.clone(),
                member_id: Some(session.member_id.clone()),
                zone: Some(session.zone.clone()),
                violation_type: ViolationType::ExtendedSession,
                official_start_time: Some(session.start_time),
                official_end_time: Some(end_time),
                timestamp: actual_last,
                overtime_minutes: Some(round_hundredths(overtime_minutes)),
                details: DETAILS.to_string(),
            });
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn at(h: u32, m: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(h, m, 0).unwrap()
    }

    fn booked(zone: &str, start: Timestamp, end: Option<Timestamp>) -> Session {
        Session::new(PersonId::from("T1"), PersonId::from("M1"), Zone::from(zone), start, end)
    }

    fn seen(zone: &str, ts: Timestamp) -> AttendanceEvent {
        AttendanceEvent::new(PersonId::from("T1"), PersonId::from("M1"), Zone::from(zone), ts)
    }

    #[test]
    fn test_overtime_beyond_tolerance() {
        let sessions = vec![booked("Z", at(10, 0), Some(at(11, 0)))];
        let attendance = vec![seen("Z", at(10, 30)), seen("Z", at(11, 15))];

        let violations = detect(&sessions, &attendance, 10, None);

        assert_eq!(violations.len(), 1);
        let v = &violations[0];
        assert_eq!(v.violation_type, ViolationType::ExtendedSession);
        assert_eq!(v.overtime_minutes, Some(15.0));
        assert_eq!(v.timestamp, at(11, 15));
        assert_eq!(v.official_start_time, Some(at(10, 0)));
        assert_eq!(v.official_end_time, Some(at(11, 0)));
        assert_eq!(v.zone, Some(Zone::from("Z")));
        assert_eq!(v.details, DETAILS);
    }

    #[test]
    fn test_exactly_at_tolerance_is_flagged() {
        let sessions = vec![booked("Z", at(10, 0), Some(at(11, 0)))];
        let violations = detect(&sessions, &[seen("Z", at(11, 10))], 10, None);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].overtime_minutes, Some(10.0));
    }

    #[test]
    fn test_within_tolerance_not_flagged() {
        let sessions = vec![booked("Z", at(10, 0), Some(at(11, 0)))];
        let attendance = vec![seen("Z", at(11, 0) + Duration::seconds(599))];
        assert!(detect(&sessions, &attendance, 10, None).is_empty());
    }

    #[test]
    fn test_overtime_rounded_to_hundredths() {
        let sessions = vec![booked("Z", at(10, 0), Some(at(11, 0)))];
        // 12m 20s = 12.333.. minutes
        let attendance = vec![seen("Z", at(11, 12) + Duration::seconds(20))];
        let violations = detect(&sessions, &attendance, 10, None);
        assert_eq!(violations[0].overtime_minutes, Some(12.33));
    }

    #[test]
    fn test_other_zone_attendance_ignored() {
        let metrics = Metrics::new();
        let sessions = vec![booked("Weights", at(10, 0), Some(at(11, 0)))];
        let attendance = vec![seen("Cardio", at(12, 0))];

        assert!(detect(&sessions, &attendance, 10, Some(&metrics)).is_empty());
        assert_eq!(metrics.report().sessions_uncorroborated, 1);
    }

    #[test]
    fn test_open_booking_skipped() {
        let sessions = vec![booked("Z", at(10, 0), None)];
        assert!(detect(&sessions, &[seen("Z", at(12, 0))], 10, None).is_empty());
    }

    #[test]
    fn test_attendance_missing_ids_ignored() {
        let sessions = vec![booked("Z", at(10, 0), Some(at(11, 0)))];
        let mut event = seen("Z", at(12, 0));
        event.member_id = None;
        assert!(detect(&sessions, &[event], 10, None).is_empty());
    }
}
