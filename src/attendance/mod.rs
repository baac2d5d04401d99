//! Parsed attendance model and the row-text parser.
//!
//! Maps are insertion-ordered so serialized output follows the order subjects
//! and dates appeared in the portal's table.

pub mod dates;
pub mod parser;

pub use parser::AttendanceParser;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Present/absent period counts attributed to a single date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCount {
    pub present: u32,
    pub absent: u32,
}

/// Per-subject attendance totals and derived metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub name: String,
    pub present: u32,
    pub absent: u32,
    pub percentage: f64,
    pub safe_bunk_periods: u32,
    pub attended_days: u32,
    pub absent_days: u32,
    pub safe_bunk_days: u32,
}

/// Aggregate across all subjects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub present: u32,
    pub absent: u32,
    pub percentage: f64,
    pub safe_bunk_periods: u32,
    pub success: bool,
    pub message: String,
}

/// Full result of one attendance scrape.
///
/// Date keys are canonical `DD-MM-YYYY` strings; `streak` counts consecutive
/// most-recent dates with at least one recorded presence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub subjects: IndexMap<String, SubjectSummary>,
    pub overall: OverallSummary,
    pub date_attendance: IndexMap<String, DayCount>,
    pub per_course_date_attendance: IndexMap<String, IndexMap<String, DayCount>>,
    pub streak: u32,
    pub attended_days: u32,
    pub absent_days: u32,
    pub safe_bunk_days: u32,
}

/// How many more periods (or days) can be skipped while staying within the
/// one-skip-per-three-attended convention.
pub(crate) fn safe_bunk(present: u32, absent: u32) -> u32 {
    (present / 3).saturating_sub(absent)
}

/// Attendance percentage rounded to two decimals, `0.0` on an empty record.
pub(crate) fn percentage(present: u32, absent: u32) -> f64 {
    let total = present + absent;
    if total == 0 {
        return 0.0;
    }
    let raw = f64::from(present) / f64::from(total) * 100.0;
    (raw * 100.0).round() / 100.0
}
