//! Result egress - writes sessions and violations to file
//!
//! Sessions are written as JSONL (one JSON object per line). Violations are
//! written as CSV for spreadsheet consumers and optionally as JSONL. Each
//! write replaces the target file; a run produces one complete result set.

use crate::domain::types::{format_timestamp, Session};
use crate::domain::violation::Violation;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Column order of the violations table
pub const VIOLATION_COLUMNS: [&str; 9] = [
    "trainer_id",
    "member_id",
    "zone",
    "violation_type",
    "official_start_time",
    "official_end_time",
    "timestamp",
    "overtime_minutes",
    "details",
];

/// Egress writer bound to one output file
pub struct Egress {
    file_path: PathBuf,
}

impl Egress {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        info!(file_path = %file_path.display(), "egress_initialized");
        Self { file_path }
    }

    /// Write inferred or booked sessions as JSONL. Returns the row count.
    pub fn write_sessions(&self, sessions: &[Session]) -> anyhow::Result<usize> {
        let count = self.write_jsonl(sessions)?;
        info!(file = %self.file_path.display(), sessions = %count, "sessions_egressed");
        Ok(count)
    }

    /// Write violations as CSV with a header row. Returns the row count.
    pub fn write_violations_csv(&self, violations: &[Violation]) -> anyhow::Result<usize> {
        let mut out = self.create()?;
        writeln!(out, "{}", VIOLATION_COLUMNS.join(","))?;
        for violation in violations {
            writeln!(out, "{}", csv_row(violation))?;
        }
        out.flush().with_context(|| format!("failed to flush {}", self.file_path.display()))?;
        info!(
            file = %self.file_path.display(),
            violations = %violations.len(),
            "violations_egressed"
        );
        Ok(violations.len())
    }

    /// Write violations as JSONL. Returns the row count.
    pub fn write_violations_jsonl(&self, violations: &[Violation]) -> anyhow::Result<usize> {
        let count = self.write_jsonl(violations)?;
        info!(file = %self.file_path.display(), violations = %count, "violations_egressed");
        Ok(count)
    }

    fn write_jsonl<T: Serialize>(&self, rows: &[T]) -> anyhow::Result<usize> {
        let mut out = self.create()?;
        for row in rows {
            let json = serde_json::to_string(row)?;
            writeln!(out, "{}", json)?;
        }
        out.flush().with_context(|| format!("failed to flush {}", self.file_path.display()))?;
        debug!(file = %self.file_path.display(), rows = %rows.len(), "egress_written");
        Ok(rows.len())
    }

    /// Open the target for writing, truncating it
    fn create(&self) -> anyhow::Result<BufWriter<File>> {
        // Create parent directories if they don't exist
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create output directory {}", parent.display())
                })?;
            }
        }
        let file = File::create(&self.file_path)
            .with_context(|| format!("failed to create {}", self.file_path.display()))?;
        Ok(BufWriter::new(file))
    }
}

fn csv_row(v: &Violation) -> String {
    let cells = [
        escape_csv(v.trainer_id.as_str()),
        v.member_id.as_ref().map(|m| escape_csv(m.as_str())).unwrap_or_default(),
        v.zone.as_ref().map(|z| escape_csv(z.as_str())).unwrap_or_default(),
        escape_csv(v.violation_type.as_str()),
        v.official_start_time.as_ref().map(format_timestamp).unwrap_or_default(),
        v.official_end_time.as_ref().map(format_timestamp).unwrap_or_default(),
        format_timestamp(&v.timestamp),
        // Debug keeps the fractional part on whole minutes (15.0, 12.5)
        v.overtime_minutes.map(|m| format!("{:?}", m)).unwrap_or_default(),
        escape_csv(&v.details),
    ];
    cells.join(",")
}

/// Quote a cell when it contains a delimiter, quote or line break
fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
