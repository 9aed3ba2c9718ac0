//! Direct payment detection: any payment the gym did not approve

use crate::domain::types::PaymentEvent;
use crate::domain::violation::{Violation, ViolationType};

pub fn detect(payments: &[PaymentEvent]) -> Vec<Violation> {
    payments
        .iter()
        .filter(|payment| !payment.approved_by_gym)
        .map(|payment| Violation {
            trainer_id: payment.trainer_id.clone(),
            member_id: payment.member_id.clone(),
            zone: None,
            violation_type: ViolationType::DirectPayment,
            official_start_time: None,
            official_end_time: None,
            timestamp: payment.timestamp,
            overtime_minutes: None,
            details: format!(
                "Trainer received direct payment of {} not approved by gym",
                payment.amount
            ),
        })
        .collect()
}
