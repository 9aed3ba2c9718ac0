//! Violation findings emitted by the rule engine

use crate::domain::types::{PersonId, Timestamp, Zone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of policy violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViolationType {
    #[serde(rename = "Extended Session")]
    ExtendedSession,
    #[serde(rename = "Unauthorized Extra Service")]
    UnauthorizedExtraService,
    #[serde(rename = "Unauthorized Interaction")]
    UnauthorizedInteraction,
    #[serde(rename = "Direct Payment")]
    DirectPayment,
}

impl ViolationType {
    pub const ALL: [ViolationType; 4] = [
        ViolationType::ExtendedSession,
        ViolationType::UnauthorizedExtraService,
        ViolationType::UnauthorizedInteraction,
        ViolationType::DirectPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationType::ExtendedSession => "Extended Session",
            ViolationType::UnauthorizedExtraService => "Unauthorized Extra Service",
            ViolationType::UnauthorizedInteraction => "Unauthorized Interaction",
            ViolationType::DirectPayment => "Direct Payment",
        }
    }

    #[inline]
    pub(crate) fn index(&self) -> usize {
        match self {
            ViolationType::ExtendedSession => 0,
            ViolationType::UnauthorizedExtraService => 1,
            ViolationType::UnauthorizedInteraction => 2,
            ViolationType::DirectPayment => 3,
        }
    }
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key downstream consumers use to collapse repeated findings
pub type DedupKey = (PersonId, Option<PersonId>, ViolationType, Timestamp);

/// A single finding. Never mutated once the engine has emitted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub trainer_id: PersonId,
    pub member_id: Option<PersonId>,
    pub zone: Option<Zone>,
    pub violation_type: ViolationType,
    pub official_start_time: Option<Timestamp>,
    pub official_end_time: Option<Timestamp>,
    pub timestamp: Timestamp,
    pub overtime_minutes: Option<f64>,
    pub details: String,
}

impl Violation {
    pub fn dedup_key(&self) -> DedupKey {
        (self.trainer_id.clone(), self.member_id.clone(), self.violation_type, self.timestamp)
    }
}

/// Round to two decimals, halves away from zero
#[inline]
pub fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
