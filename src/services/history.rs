//! Identity history building
//!
//! Capture frames arrive keyed by ephemeral track id. The builder keeps an
//! append-only log per track; `finish` regroups the log by resolved identity
//! and sorts each identity's sightings chronologically.

use crate::domain::types::{
    Observation, PersonId, Role, Timestamp, TrackId, TrackedIdentity, Zone,
};
use crate::infra::metrics::Metrics;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One entry of a track log
#[derive(Debug, Clone)]
struct TrackEntry {
    timestamp: Timestamp,
    zone: Zone,
    identity: Option<PersonId>,
}

/// Accumulates per-track sightings during ingestion
pub struct HistoryBuilder {
    tracks: FxHashMap<TrackId, Vec<TrackEntry>>,
    observation_count: usize,
    metrics: Option<Arc<Metrics>>,
}

impl HistoryBuilder {
    pub fn new() -> Self {
        Self { tracks: FxHashMap::default(), observation_count: 0, metrics: None }
    }

    /// Create a builder that records ingestion counters
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self { metrics: Some(metrics), ..Self::new() }
    }

    /// Append one sighting per tracked object seen in a capture frame
    pub fn record_frame(&mut self, tracked: &[TrackedIdentity], timestamp: Timestamp, zone: &Zone) {
        for object in tracked {
            self.record(object.track_id, object.identity.clone(), timestamp, zone.clone());
        }
    }

    /// Append a single sighting to a track log
    pub fn record(
        &mut self,
        track_id: TrackId,
        identity: Option<PersonId>,
        timestamp: Timestamp,
        zone: Zone,
    ) {
        self.tracks.entry(track_id).or_default().push(TrackEntry { timestamp, zone, identity });
        self.observation_count += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_observation();
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn observation_count(&self) -> usize {
        self.observation_count
    }

    /// Finalize into per-identity histories.
    ///
    /// Entries without a resolved identity are dropped. Each identity's
    /// observations are stable-sorted by timestamp, so equal timestamps keep
    /// their track/append order.
    pub fn finish(self) -> IdentityHistory {
        let mut unresolved = 0u64;
        let mut by_identity: FxHashMap<PersonId, Vec<Observation>> = FxHashMap::default();

        // Visit tracks in id order so tie order does not depend on hashing
        let mut tracks: Vec<(TrackId, Vec<TrackEntry>)> = self.tracks.into_iter().collect();
        tracks.sort_by_key(|(track_id, _)| *track_id);

        for (track_id, entries) in tracks {
            for entry in entries {
                let Some(identity) = entry.identity else {
                    unresolved += 1;
                    continue;
                };
                by_identity.entry(identity.clone()).or_default().push(Observation::new(
                    identity,
                    entry.timestamp,
                    entry.zone,
                ));
            }
            debug!(track_id = %track_id, "track_log_finalized");
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_unresolved_observations(unresolved);
        }

        let history = IdentityHistory::from_grouped(by_identity);
        info!(
            identities = %history.len(),
            observations = %self.observation_count,
            unresolved = %unresolved,
            "identity_history_built"
        );
        history
    }
}

impl Default for HistoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable chronological sightings per resolved identity
#[derive(Debug, Clone, Default)]
pub struct IdentityHistory {
    by_identity: FxHashMap<PersonId, Vec<Observation>>,
}

impl IdentityHistory {
    /// Build directly from already-resolved observations
    pub fn from_observations<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        let mut by_identity: FxHashMap<PersonId, Vec<Observation>> = FxHashMap::default();
        for observation in observations {
            by_identity.entry(observation.identity.clone()).or_default().push(observation);
        }
        Self::from_grouped(by_identity)
    }

    fn from_grouped(mut by_identity: FxHashMap<PersonId, Vec<Observation>>) -> Self {
        for observations in by_identity.values_mut() {
            observations.sort_by_key(|o| o.timestamp);
        }
        Self { by_identity }
    }

    /// Sightings for an identity, empty when it was never seen
    pub fn observations(&self, identity: &PersonId) -> &[Observation] {
        self.by_identity.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Known identities in sorted order
    pub fn identities(&self) -> Vec<&PersonId> {
        let mut ids: Vec<&PersonId> = self.by_identity.keys().collect();
        ids.sort();
        ids
    }

    /// Split known identities into (trainers, members) by id convention.
    /// Used when no roster is configured.
    pub fn roster_by_id_prefix(&self) -> (Vec<PersonId>, Vec<PersonId>) {
        self.identities()
            .into_iter()
            .cloned()
            .partition(|id| Role::infer_from_id(id) == Role::Trainer)
    }

    pub fn len(&self) -> usize {
        self.by_identity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_identity.is_empty()
    }
}
