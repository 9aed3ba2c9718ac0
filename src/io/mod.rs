//! IO modules - file inputs and outputs
//!
//! This module contains all external IO operations:
//! - `ingest` - JSON Lines readers with record cleaning and skip reporting
//! - `egress` - Session and violation output (JSONL and CSV)

pub mod egress;
pub mod ingest;

// Re-export commonly used types
pub use egress::Egress;
pub use ingest::{Ingested, RecordError, Sighting, SkippedRecord};
