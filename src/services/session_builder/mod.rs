//! Session inference from co-presence timelines
//!
//! For each trainer/member pair, walks both chronological histories with two
//! pointers. Sightings within `max_session_gap_seconds` of each other extend
//! an open window; the first pair further apart closes it. Windows shorter
//! than `min_session_seconds` are dropped as noise.
//!
//! Tie-break: when both pointers sit on the same timestamp the member pointer
//! advances.

use crate::domain::types::{Observation, PersonId, Session, Timestamp, Zone};
use crate::infra::config::Policy;
use crate::infra::metrics::Metrics;
use crate::services::history::IdentityHistory;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Namespace for deterministic inferred-session ids
const SESSION_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_0c52_93d4_4e0b_8b61_2f7e_5c3a_9d10);

/// Deterministic id for an inferred session, stable across runs
pub fn inferred_session_id(
    trainer_id: &PersonId,
    member_id: &PersonId,
    start: Timestamp,
    end: Timestamp,
) -> String {
    let name = format!("{}|{}|{}|{}", trainer_id, member_id, start, end);
    Uuid::new_v5(&SESSION_ID_NAMESPACE, name.as_bytes()).to_string()
}

/// Open co-presence window
#[derive(Debug, Clone)]
struct Window {
    start: Timestamp,
    end: Timestamp,
    zone: Zone,
}

/// Builds sessions from identity histories
pub struct SessionBuilder {
    policy: Policy,
    metrics: Option<Arc<Metrics>>,
}

impl SessionBuilder {
    pub fn new(policy: Policy) -> Self {
        Self { policy, metrics: None }
    }

    /// Create a session builder with metrics recording
    pub fn with_metrics(policy: Policy, metrics: Arc<Metrics>) -> Self {
        Self { policy, metrics: Some(metrics) }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Infer sessions for every pair of the declared rosters.
    ///
    /// Rosters are de-duplicated and walked in sorted order, so the output
    /// order only depends on the inputs.
    pub fn infer(
        &self,
        history: &IdentityHistory,
        trainers: &[PersonId],
        members: &[PersonId],
    ) -> Vec<Session> {
        let trainers: BTreeSet<&PersonId> = trainers.iter().collect();
        let members: BTreeSet<&PersonId> = members.iter().collect();

        let mut sessions = Vec::new();
        for trainer_id in &trainers {
            let trainer_history = history.observations(trainer_id);
            for member_id in &members {
                let member_history = history.observations(member_id);
                sessions.extend(self.infer_pair(
                    trainer_id,
                    member_id,
                    trainer_history,
                    member_history,
                ));
            }
        }

        info!(
            trainers = %trainers.len(),
            members = %members.len(),
            sessions = %sessions.len(),
            "sessions_inferred"
        );
        sessions
    }

    /// Merge one trainer/member pair of sorted histories into sessions
    pub fn infer_pair(
        &self,
        trainer_id: &PersonId,
        member_id: &PersonId,
        trainer_history: &[Observation],
        member_history: &[Observation],
    ) -> Vec<Session> {
        let mut sessions = Vec::new();
        if trainer_history.is_empty() || member_history.is_empty() {
            return sessions;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_pair_evaluated();
        }

        let max_gap = self.policy.max_session_gap();
        let mut window: Option<Window> = None;
        let (mut i, mut j) = (0, 0);

        while i < trainer_history.len() && j < member_history.len() {
            let trainer_obs = &trainer_history[i];
            let member_obs = &member_history[j];
            let (t_ts, m_ts) = (trainer_obs.timestamp, member_obs.timestamp);
            // Compared at full precision, sub-second parts included
            let diff = (t_ts - m_ts).abs();

            if diff <= max_gap {
                let end = t_ts.max(m_ts);
                match window.as_mut() {
                    Some(open) => open.end = end,
                    None => {
                        // Zone of the earlier sighting; trainer's on a tie
                        let (start, zone) = if m_ts < t_ts {
                            (m_ts, &member_obs.zone)
                        } else {
                            (t_ts, &trainer_obs.zone)
                        };
                        window = Some(Window { start, end, zone: zone.clone() });
                    }
                }
            } else if let Some(closed) = window.take() {
                debug!(
                    trainer_id = %trainer_id,
                    member_id = %member_id,
                    gap_ms = %diff.num_milliseconds(),
                    "copresence_gap_closed_window"
                );
                self.close_window(trainer_id, member_id, closed, &mut sessions);
            }

            if t_ts < m_ts {
                i += 1;
            } else {
                j += 1;
            }
        }

        if let Some(open) = window.take() {
            self.close_window(trainer_id, member_id, open, &mut sessions);
        }

        sessions
    }

    /// Emit the window as a session if it lasted long enough
    fn close_window(
        &self,
        trainer_id: &PersonId,
        member_id: &PersonId,
        window: Window,
        sessions: &mut Vec<Session>,
    ) {
        let duration = window.end - window.start;
        let duration_secs = duration.num_seconds();
        if duration < self.policy.min_session() {
            debug!(
                trainer_id = %trainer_id,
                member_id = %member_id,
                duration_secs = %duration_secs,
                "copresence_window_too_short"
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_window_dropped();
            }
            return;
        }

        let session_id = inferred_session_id(trainer_id, member_id, window.start, window.end);
        debug!(
            session_id = %session_id,
            trainer_id = %trainer_id,
            member_id = %member_id,
            zone = %window.zone,
            duration_secs = %duration_secs,
            "session_emitted"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_session_emitted();
        }
        sessions.push(
            Session::new(
                trainer_id.clone(),
                member_id.clone(),
                window.zone,
                window.start,
                Some(window.end),
            )
            .with_session_id(session_id),
        );
    }
}

#[cfg(test)]
mod tests;
