//! Violation rule engine
//!
//! Runs four independent detectors over booked sessions, attendance and
//! payments and concatenates their findings in a fixed order:
//! 1. Extended Session
//! 2. Unauthorized Extra Service
//! 3. Unauthorized Interaction
//! 4. Direct Payment
//!
//! Findings are neither deduplicated nor cross-filtered here; downstream
//! consumers use `Violation::dedup_key` when they need unique rows.

pub mod coverage;
pub mod direct_payment;
pub mod extended_session;
pub mod unauthorized;

use crate::domain::types::{AttendanceEvent, PaymentEvent, Session};
use crate::domain::violation::{Violation, ViolationType};
use crate::infra::config::Policy;
use crate::infra::metrics::Metrics;
use coverage::CoverageIndex;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationStatus {
    /// At least one input collection had records
    Evaluated,
    /// Sessions, attendance and payments were all empty
    NoData,
}

/// Findings of one evaluation
#[derive(Debug, Clone)]
pub struct ViolationReport {
    pub violations: Vec<Violation>,
    pub status: ViolationStatus,
}

impl ViolationReport {
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of findings per violation type (types with none are omitted)
    pub fn count_by_type(&self) -> BTreeMap<ViolationType, usize> {
        let mut counts = BTreeMap::new();
        for violation in &self.violations {
            *counts.entry(violation.violation_type).or_insert(0) += 1;
        }
        counts
    }

    /// Findings left after collapsing on `Violation::dedup_key`
    pub fn unique_count(&self) -> usize {
        self.violations.iter().map(Violation::dedup_key).collect::<HashSet<_>>().len()
    }
}

/// Evaluates the violation rules under a fixed policy
pub struct ViolationEngine {
    policy: Policy,
    metrics: Option<Arc<Metrics>>,
}

impl ViolationEngine {
    pub fn new(policy: Policy) -> Self {
        Self { policy, metrics: None }
    }

    /// Create an engine with metrics recording
    pub fn with_metrics(policy: Policy, metrics: Arc<Metrics>) -> Self {
        Self { policy, metrics: Some(metrics) }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Run all detectors. Inputs are only read.
    pub fn evaluate(
        &self,
        sessions: &[Session],
        attendance: &[AttendanceEvent],
        payments: &[PaymentEvent],
    ) -> ViolationReport {
        if sessions.is_empty() && attendance.is_empty() && payments.is_empty() {
            warn!("violation_rules_no_data");
            return ViolationReport { violations: Vec::new(), status: ViolationStatus::NoData };
        }

        let metrics = self.metrics.as_deref();
        let unjoinable = attendance.iter().filter(|event| event.pair().is_none()).count();
        if unjoinable > 0 {
            debug!(unjoinable = %unjoinable, "attendance_missing_join_keys");
            if let Some(metrics) = metrics {
                metrics.record_unjoinable_attendance(unjoinable as u64);
            }
        }

        let index = CoverageIndex::build(sessions, self.policy.tolerance());

        let mut violations =
            extended_session::detect(sessions, attendance, self.policy.tolerance_minutes(), metrics);
        violations.extend(unauthorized::detect_extra_services(&index, attendance));
        violations.extend(unauthorized::detect_interactions(&index, attendance));
        violations.extend(direct_payment::detect(payments));

        if let Some(metrics) = metrics {
            for violation in &violations {
                metrics.record_violation(violation.violation_type);
            }
        }

        let report = ViolationReport { violations, status: ViolationStatus::Evaluated };
        let counts = report.count_by_type();
        let count_of = |t: ViolationType| counts.get(&t).copied().unwrap_or(0);
        info!(
            sessions = %sessions.len(),
            attendance = %attendance.len(),
            payments = %payments.len(),
            violations = %report.violations.len(),
            extended = %count_of(ViolationType::ExtendedSession),
            extra_service = %count_of(ViolationType::UnauthorizedExtraService),
            interaction = %count_of(ViolationType::UnauthorizedInteraction),
            direct_payment = %count_of(ViolationType::DirectPayment),
            "violation_rules_evaluated"
        );
        report
    }
}
