//! Converts raw attendance table rows into an [`AttendanceReport`].
//!
//! Pure single pass over the row text, no I/O. The only carried state is the
//! course whose section of the table we are currently inside: the portal
//! renders a course header row followed by that course's period rows.

use crate::attendance::dates::{extract_date_key, parse_date_key};
use crate::attendance::{
    AttendanceReport, DayCount, OverallSummary, SubjectSummary, percentage, safe_bunk,
};
use indexmap::IndexMap;
use regex::Regex;
use std::sync::LazyLock;

/// Course header rows look like "AAB101 - DATA STRUCTURES": a letters-then-
/// digits course code (or the portal's odd fixed code ACDD05), a separator,
/// then the course name.
static COURSE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z]+\d+|ACDD05)\s*[-:\s]+\s*(.+)$").expect("course header regex is valid")
});

pub struct AttendanceParser {
    reference_year: i32,
}

impl AttendanceParser {
    /// `reference_year` is applied to dates the portal renders without a year.
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    pub fn parse<S: AsRef<str>>(&self, rows: &[S]) -> AttendanceReport {
        let mut report = AttendanceReport::default();
        let mut current_course: Option<String> = None;
        let mut total_present: u32 = 0;
        let mut total_absent: u32 = 0;

        for row in rows {
            let text = row.as_ref().trim().to_uppercase();
            if text.is_empty() || text.starts_with("S.NO") || text.contains("TOPICS COVERED") {
                continue;
            }

            if let Some(caps) = COURSE_HEADER.captures(&text) {
                let code = caps[1].to_owned();
                let name = caps[2].trim().to_owned();
                report.subjects.insert(
                    code.clone(),
                    SubjectSummary {
                        name,
                        ..SubjectSummary::default()
                    },
                );
                report
                    .per_course_date_attendance
                    .insert(code.clone(), IndexMap::new());
                current_course = Some(code);
                continue;
            }

            // Rows before the first course header have nothing to attribute
            // their counts to and are dropped.
            let Some(course) = current_course.as_deref() else {
                continue;
            };

            let present = text.matches("PRESENT").count() as u32;
            let absent = text.matches("ABSENT").count() as u32;
            if let Some(subject) = report.subjects.get_mut(course) {
                subject.present += present;
                subject.absent += absent;
            }
            total_present += present;
            total_absent += absent;

            // Date-indexed maps only get rows whose date token normalizes;
            // the counts above are kept either way.
            if let Some(date_key) = extract_date_key(&text, self.reference_year) {
                let day = report.date_attendance.entry(date_key.clone()).or_default();
                day.present += present;
                day.absent += absent;

                if let Some(course_dates) = report.per_course_date_attendance.get_mut(course) {
                    let day = course_dates.entry(date_key).or_default();
                    day.present += present;
                    day.absent += absent;
                }
            }
        }

        for (code, subject) in report.subjects.iter_mut() {
            subject.percentage = percentage(subject.present, subject.absent);
            subject.safe_bunk_periods = safe_bunk(subject.present, subject.absent);

            let (attended, absent_days) = day_counts(report.per_course_date_attendance.get(code));
            subject.attended_days = attended;
            subject.absent_days = absent_days;
            subject.safe_bunk_days = safe_bunk(attended, absent_days);
        }

        if total_present + total_absent > 0 {
            let overall_percentage = percentage(total_present, total_absent);
            report.overall = OverallSummary {
                present: total_present,
                absent: total_absent,
                percentage: overall_percentage,
                safe_bunk_periods: safe_bunk(total_present, total_absent),
                success: true,
                message: format!(
                    "Overall Attendance: Present = {total_present}, Absent = {total_absent}, \
                     Percentage = {overall_percentage}%"
                ),
            };
        }

        if !report.date_attendance.is_empty() {
            report.streak = streak(&report.date_attendance);
            let (attended, absent_days) = day_counts(Some(&report.date_attendance));
            report.attended_days = attended;
            report.absent_days = absent_days;
            report.safe_bunk_days = safe_bunk(attended, absent_days);
        }

        report
    }
}

/// (days with any presence, days with only absences) over a date map.
fn day_counts(dates: Option<&IndexMap<String, DayCount>>) -> (u32, u32) {
    let Some(dates) = dates else {
        return (0, 0);
    };
    let attended = dates.values().filter(|d| d.present > 0).count() as u32;
    let absent = dates
        .values()
        .filter(|d| d.present == 0 && d.absent > 0)
        .count() as u32;
    (attended, absent)
}

/// Consecutive most-recent dates with presence, walking backward from the
/// latest date. If any key fails to re-parse, the chronological sort is
/// abandoned and parse order stands in for it.
fn streak(dates: &IndexMap<String, DayCount>) -> u32 {
    let mut counts: Vec<&DayCount> = dates.values().collect();
    let parsed: Option<Vec<_>> = dates.keys().map(|k| parse_date_key(k)).collect();
    if let Some(parsed) = parsed {
        let mut order: Vec<usize> = (0..parsed.len()).collect();
        order.sort_by_key(|&i| parsed[i]);
        counts = order
            .into_iter()
            .filter_map(|i| dates.get_index(i).map(|(_, v)| v))
            .collect();
    }

    let mut streak = 0;
    for day in counts.iter().rev() {
        if day.present > 0 {
            streak += 1;
        } else {
            break;
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(rows: &[&str]) -> AttendanceReport {
        AttendanceParser::new(2025).parse(rows)
    }

    #[test]
    fn course_header_starts_a_fresh_subject() {
        let report = parse(&[
            "AAB101 - DATA STRUCTURES",
            "1 20 Aug, 2025 P1 PRESENT",
            "AAB101 - DATA STRUCTURES",
        ]);
        // The second header resets the entry; counts start over at zero.
        let subject = &report.subjects["AAB101"];
        assert_eq!(subject.name, "DATA STRUCTURES");
        assert_eq!(subject.present, 0);
        assert_eq!(subject.absent, 0);
    }

    #[test]
    fn header_row_contributes_no_counts() {
        let report = parse(&["AAB101 - PRESENT AND ABSENT THEORY"]);
        let subject = &report.subjects["AAB101"];
        assert_eq!((subject.present, subject.absent), (0, 0));
        assert_eq!(report.overall.present, 0);
    }

    #[test]
    fn multiple_tokens_per_row_accumulate() {
        let report = parse(&["AAB101 - MATH", "20 Aug 2025 PRESENT PRESENT ABSENT"]);
        let subject = &report.subjects["AAB101"];
        assert_eq!(subject.present, 2);
        assert_eq!(subject.absent, 1);
        assert_eq!(report.overall.present, 2);
        assert_eq!(report.overall.absent, 1);
        assert_eq!(report.date_attendance["20-08-2025"].present, 2);
    }

    #[test]
    fn rows_before_first_header_are_dropped() {
        let report = parse(&["20 Aug 2025 PRESENT", "AAB101 - MATH"]);
        assert_eq!(report.overall.present, 0);
        assert!(report.date_attendance.is_empty());
    }

    #[test]
    fn header_and_filler_rows_are_skipped() {
        let report = parse(&[
            "AAB101 - MATH",
            "S.NO DATE STATUS",
            "WEEK 1 TOPICS COVERED INTRO",
            "   ",
            "20 Aug 2025 PRESENT",
        ]);
        assert_eq!(report.subjects["AAB101"].present, 1);
    }

    #[test]
    fn percentage_follows_the_rounding_rule() {
        let report = parse(&[
            "AAB101 - MATH",
            "20 Aug 2025 PRESENT PRESENT",
            "21 Aug 2025 ABSENT",
        ]);
        assert_eq!(report.subjects["AAB101"].percentage, 66.67);
        assert_eq!(report.overall.percentage, 66.67);
    }

    #[test]
    fn empty_subject_percentage_is_zero() {
        let report = parse(&["AAB101 - MATH"]);
        assert_eq!(report.subjects["AAB101"].percentage, 0.0);
        assert!(!report.overall.success);
    }

    #[test]
    fn safe_bunk_arithmetic() {
        let rows: Vec<String> = std::iter::once("AAB101 - MATH".to_owned())
            .chain((1..=9).map(|d| format!("{d} Aug 2025 PRESENT")))
            .chain(std::iter::once("10 Aug 2025 ABSENT".to_owned()))
            .collect();
        let report = AttendanceParser::new(2025).parse(&rows);
        let subject = &report.subjects["AAB101"];
        assert_eq!((subject.present, subject.absent), (9, 1));
        assert_eq!(subject.safe_bunk_periods, 2);
        // Day-based variant over the same 10 single-period days.
        assert_eq!(subject.attended_days, 9);
        assert_eq!(subject.absent_days, 1);
        assert_eq!(subject.safe_bunk_days, 2);
    }

    #[test]
    fn safe_bunk_never_goes_negative() {
        let report = parse(&["AAB101 - MATH", "20 Aug 2025 ABSENT"]);
        assert_eq!(report.subjects["AAB101"].safe_bunk_periods, 0);
    }

    #[test]
    fn streak_counts_back_from_latest_date() {
        let report = parse(&[
            "AAB101 - MATH",
            "01-01-2025 ABSENT",
            "02-01-2025 PRESENT",
            "03-01-2025 PRESENT",
        ]);
        assert_eq!(report.streak, 2);
    }

    #[test]
    fn streak_is_zero_when_latest_date_has_no_presence() {
        let report = parse(&[
            "AAB101 - MATH",
            "01-01-2025 PRESENT",
            "02-01-2025 ABSENT",
        ]);
        assert_eq!(report.streak, 0);
    }

    #[test]
    fn streak_sorts_chronologically_not_by_parse_order() {
        let report = parse(&[
            "AAB101 - MATH",
            "03-01-2025 PRESENT",
            "01-01-2025 ABSENT",
            "02-01-2025 PRESENT",
        ]);
        // Chronological tail is 02-01 (present), 03-01 (present).
        assert_eq!(report.streak, 2);
    }

    #[test]
    fn unparseable_date_keeps_counts_but_skips_date_maps() {
        let report = parse(&["AAB101 - MATH", "32 Aug 2025 PRESENT"]);
        let subject = &report.subjects["AAB101"];
        assert_eq!(subject.present, 1);
        assert!(report.date_attendance.is_empty());
        assert_eq!(subject.attended_days, 0);
    }

    #[test]
    fn date_counts_reconcile_with_subject_totals() {
        let report = parse(&[
            "AAB101 - MATH",
            "20 Aug 2025 PRESENT",
            "20 Aug 2025 ABSENT",
            "21 Aug 2025 PRESENT",
        ]);
        let subject = &report.subjects["AAB101"];
        let dates = &report.per_course_date_attendance["AAB101"];
        let present: u32 = dates.values().map(|d| d.present).sum();
        let absent: u32 = dates.values().map(|d| d.absent).sum();
        assert_eq!((present, absent), (subject.present, subject.absent));
    }

    #[test]
    fn parsing_is_idempotent() {
        let rows = [
            "AAB101 - MATH",
            "20 Aug 2025 PRESENT",
            "AAB102 - PHYSICS",
            "21 Aug 2025 ABSENT",
        ];
        assert_eq!(parse(&rows), parse(&rows));
    }

    #[test]
    fn two_subject_end_to_end() {
        let report = parse(&[
            "AAB101 - MATH",
            "P1 PRESENT 20 Aug 2025",
            "AAB102 - PHYSICS",
            "P1 ABSENT 21 Aug 2025",
        ]);

        let math = &report.subjects["AAB101"];
        assert_eq!((math.present, math.absent), (1, 0));
        assert_eq!(math.percentage, 100.0);

        let physics = &report.subjects["AAB102"];
        assert_eq!((physics.present, physics.absent), (0, 1));
        assert_eq!(physics.percentage, 0.0);

        assert_eq!(report.overall.present, 1);
        assert_eq!(report.overall.absent, 1);
        assert_eq!(report.overall.percentage, 50.0);
        assert!(report.overall.success);
    }

    #[test]
    fn date_maps_aggregate_across_subjects() {
        let report = parse(&[
            "AAB101 - MATH",
            "20 Aug 2025 PRESENT",
            "AAB102 - PHYSICS",
            "20 Aug 2025 PRESENT",
            "21 Aug 2025 ABSENT",
        ]);
        assert_eq!(report.date_attendance["20-08-2025"].present, 2);
        assert_eq!(report.date_attendance["21-08-2025"].absent, 1);
        assert_eq!(report.per_course_date_attendance["AAB101"]["20-08-2025"].present, 1);
        assert_eq!(report.per_course_date_attendance["AAB102"]["21-08-2025"].absent, 1);
        assert_eq!(report.streak, 0);
        assert_eq!(report.attended_days, 1);
        assert_eq!(report.absent_days, 1);
    }
}
