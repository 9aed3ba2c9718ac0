//! Booked-session coverage lookups
//!
//! Groups booked sessions by trainer/member pair (and by pair plus zone) so a
//! coverage check only scans the bookings of the event's own pair.

use crate::domain::types::{PersonId, Session, Timestamp, Zone};
use chrono::Duration;
use rustc_hash::FxHashMap;

type PairKey<'a> = (&'a PersonId, &'a PersonId);
type PairZoneKey<'a> = (&'a PersonId, &'a PersonId, &'a Zone);

/// Index over booked sessions answering "is this instant covered?"
pub struct CoverageIndex<'a> {
    by_pair: FxHashMap<PairKey<'a>, Vec<&'a Session>>,
    by_pair_zone: FxHashMap<PairZoneKey<'a>, Vec<&'a Session>>,
    tolerance: Duration,
}

impl<'a> CoverageIndex<'a> {
    /// Build from booked sessions. Open bookings cover nothing and are left out.
    pub fn build(sessions: &'a [Session], tolerance: Duration) -> Self {
        let mut by_pair: FxHashMap<PairKey<'a>, Vec<&'a Session>> = FxHashMap::default();
        let mut by_pair_zone: FxHashMap<PairZoneKey<'a>, Vec<&'a Session>> = FxHashMap::default();

        for session in sessions.iter().filter(|s| s.end_time.is_some()) {
            by_pair.entry((&session.trainer_id, &session.member_id)).or_default().push(session);
            by_pair_zone
                .entry((&session.trainer_id, &session.member_id, &session.zone))
                .or_default()
                .push(session);
        }

        Self { by_pair, by_pair_zone, tolerance }
    }

    /// Covered by a booking of the same pair in the same zone
    pub fn covered_in_zone(
        &self,
        trainer_id: &PersonId,
        member_id: &PersonId,
        zone: &Zone,
        ts: Timestamp,
    ) -> bool {
        self.by_pair_zone
            .get(&(trainer_id, member_id, zone))
            .is_some_and(|sessions| sessions.iter().any(|s| s.covers(ts, self.tolerance)))
    }

    /// Covered by a booking of the same pair in any zone
    pub fn covered_any_zone(&self, trainer_id: &PersonId, member_id: &PersonId, ts: Timestamp) -> bool {
        self.by_pair
            .get(&(trainer_id, member_id))
            .is_some_and(|sessions| sessions.iter().any(|s| s.covers(ts, self.tolerance)))
    }
}
