//! Services - inference and rule evaluation
//!
//! This module contains the core business logic services:
//! - `history` - Per-track sighting logs regrouped by resolved identity
//! - `session_builder` - Trainer/member co-presence session inference
//! - `attendance` - Pairs per-person presence into trainer/member attendance
//! - `rules` - Violation rule engine (extended session, coverage, payments)

pub mod attendance;
pub mod history;
pub mod rules;
pub mod session_builder;

// Re-export commonly used types
pub use attendance::pair_presence;
pub use history::{HistoryBuilder, IdentityHistory};
pub use rules::{ViolationEngine, ViolationReport, ViolationStatus};
pub use session_builder::SessionBuilder;
