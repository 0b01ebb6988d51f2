//! Read-side views over the ledger: display ordering, filters, daily stats.

use crate::types::{AttendanceRecord, AttendanceType};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Records newest first. Storage order is left untouched.
pub fn display_order(records: &[AttendanceRecord]) -> Vec<&AttendanceRecord> {
    filter(records, None, None)
}

/// Records matching an optional type and an optional date, newest first.
pub fn filter(
    records: &[AttendanceRecord],
    status: Option<AttendanceType>,
    date: Option<NaiveDate>,
) -> Vec<&AttendanceRecord> {
    let mut out: Vec<_> = records
        .iter()
        .filter(|r| status.map_or(true, |s| r.kind == s))
        .filter(|r| date.map_or(true, |d| r.date == d))
        .collect();
    out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    out
}

/// Summary counters for the dashboard header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DailyStats {
    /// Check-in events recorded today.
    pub checkins_today: usize,
    /// People whose latest event today is a check-in.
    pub currently_checked_in: usize,
    pub total_records: usize,
}

impl DailyStats {
    pub fn compute(records: &[AttendanceRecord], today: NaiveDate) -> Self {
        let mut checkins_today = 0;
        let mut latest: HashMap<&str, &AttendanceRecord> = HashMap::new();

        for r in records.iter().filter(|r| r.date == today) {
            if r.kind == AttendanceType::CheckIn {
                checkins_today += 1;
            }
            // Equal timestamps: the later-inserted record wins, as in the classifier.
            let slot = latest.entry(r.face_id.as_str()).or_insert(r);
            if r.timestamp >= slot.timestamp {
                *slot = r;
            }
        }

        Self {
            checkins_today,
            currently_checked_in: latest
                .values()
                .filter(|r| r.kind == AttendanceType::CheckIn)
                .count(),
            total_records: records.len(),
        }
    }
}
