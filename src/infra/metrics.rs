//! Lock-free run metrics and end-of-run reporting
//!
//! Uses atomics so engines can record from any thread without a mutex.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use them for coordination or logic decisions.

use crate::domain::violation::ViolationType;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

const NUM_VIOLATION_TYPES: usize = ViolationType::ALL.len();

/// Lock-free metrics collector for one pipeline run
pub struct Metrics {
    /// Observations appended to track logs
    observations_ingested: AtomicU64,
    /// Observations dropped at finalization (no resolved identity)
    observations_unresolved: AtomicU64,
    /// Input records excluded as malformed
    records_skipped: AtomicU64,
    /// Trainer/member pairs evaluated by the session engine
    pairs_evaluated: AtomicU64,
    /// Sessions emitted by inference
    sessions_emitted: AtomicU64,
    /// Co-presence windows dropped as shorter than the minimum
    windows_dropped_short: AtomicU64,
    /// Booked sessions with no corroborating attendance
    sessions_uncorroborated: AtomicU64,
    /// Attendance events excluded for missing join keys
    attendance_unjoinable: AtomicU64,
    /// Findings per violation type, indexed by `ViolationType::index`
    violations: [AtomicU64; NUM_VIOLATION_TYPES],
    /// Run start, used for the elapsed time in the report
    started_at: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            observations_ingested: AtomicU64::new(0),
            observations_unresolved: AtomicU64::new(0),
            records_skipped: AtomicU64::new(0),
            pairs_evaluated: AtomicU64::new(0),
            sessions_emitted: AtomicU64::new(0),
            windows_dropped_short: AtomicU64::new(0),
            sessions_uncorroborated: AtomicU64::new(0),
            attendance_unjoinable: AtomicU64::new(0),
            violations: std::array::from_fn(|_| AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    #[inline]
    pub fn record_observation(&self) {
        self.observations_ingested.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unresolved_observations(&self, count: u64) {
        self.observations_unresolved.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_skipped(&self, count: u64) {
        self.records_skipped.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pair_evaluated(&self) {
        self.pairs_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_session_emitted(&self) {
        self.sessions_emitted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_window_dropped(&self) {
        self.windows_dropped_short.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_uncorroborated_session(&self) {
        self.sessions_uncorroborated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unjoinable_attendance(&self, count: u64) {
        self.attendance_unjoinable.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_violation(&self, violation_type: ViolationType) {
        self.violations[violation_type.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn sessions_emitted(&self) -> u64 {
        self.sessions_emitted.load(Ordering::Relaxed)
    }

    pub fn windows_dropped_short(&self) -> u64 {
        self.windows_dropped_short.load(Ordering::Relaxed)
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }

    pub fn violations_of(&self, violation_type: ViolationType) -> u64 {
        self.violations[violation_type.index()].load(Ordering::Relaxed)
    }

    /// Snapshot all counters (no reset; a run reports once)
    pub fn report(&self) -> MetricsSummary {
        let violations_by_type: [u64; NUM_VIOLATION_TYPES] =
            std::array::from_fn(|i| self.violations[i].load(Ordering::Relaxed));
        MetricsSummary {
            observations_ingested: self.observations_ingested.load(Ordering::Relaxed),
            observations_unresolved: self.observations_unresolved.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            pairs_evaluated: self.pairs_evaluated.load(Ordering::Relaxed),
            sessions_emitted: self.sessions_emitted.load(Ordering::Relaxed),
            windows_dropped_short: self.windows_dropped_short.load(Ordering::Relaxed),
            sessions_uncorroborated: self.sessions_uncorroborated.load(Ordering::Relaxed),
            attendance_unjoinable: self.attendance_unjoinable.load(Ordering::Relaxed),
            violations_total: violations_by_type.iter().sum(),
            violations_by_type,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub observations_ingested: u64,
    pub observations_unresolved: u64,
    pub records_skipped: u64,
    pub pairs_evaluated: u64,
    pub sessions_emitted: u64,
    pub windows_dropped_short: u64,
    pub sessions_uncorroborated: u64,
    pub attendance_unjoinable: u64,
    pub violations_total: u64,
    /// Same order as `ViolationType::ALL`
    pub violations_by_type: [u64; NUM_VIOLATION_TYPES],
    pub elapsed_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        let [extended, extra_service, interaction, direct_payment] = self.violations_by_type;
        info!(
            observations = %self.observations_ingested,
            unresolved = %self.observations_unresolved,
            skipped = %self.records_skipped,
            pairs = %self.pairs_evaluated,
            sessions = %self.sessions_emitted,
            short_windows = %self.windows_dropped_short,
            uncorroborated = %self.sessions_uncorroborated,
            unjoinable = %self.attendance_unjoinable,
            violations = %self.violations_total,
            extended = %extended,
            extra_service = %extra_service,
            interaction = %interaction,
            direct_payment = %direct_payment,
            elapsed_ms = %self.elapsed_ms,
            "run_metrics"
        );
    }
}
