//! Check-in / check-out determination.
//!
//! Each `(face_id, date)` pair is a two-state machine: awaiting check-in,
//! awaiting check-out. The state is never stored; it is recovered from the
//! latest record of that face on that day.

use crate::types::{AttendanceRecord, AttendanceType};
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day used for attendance grouping.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Decides the type of the next event for a recognized face.
#[derive(Clone)]
pub struct Classifier {
    clock: Arc<dyn Clock>,
}

impl Classifier {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Classify the next event for `face_id` against today's records.
    ///
    /// `records` may be the whole ledger; it is filtered to the face and the
    /// clock's current date here.
    pub fn classify(&self, face_id: &str, records: &[AttendanceRecord]) -> AttendanceType {
        self.classify_at(face_id, self.clock.now(), records)
    }

    /// Classify an event stamped `at`, for callers that already read the clock.
    pub fn classify_at(
        &self,
        face_id: &str,
        at: DateTime<Utc>,
        records: &[AttendanceRecord],
    ) -> AttendanceType {
        let date = at.date_naive();
        let kind = next_type(face_id, date, records);
        tracing::debug!(face_id, %date, kind = %kind, "classified attendance event");
        kind
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}

/// Next event type for `face_id` on `date`.
///
/// Looks at the record with the greatest timestamp; on equal timestamps the
/// later one in `records` wins.
pub fn next_type(face_id: &str, date: NaiveDate, records: &[AttendanceRecord]) -> AttendanceType {
    let latest = records
        .iter()
        .filter(|r| r.face_id == face_id && r.date == date)
        .max_by_key(|r| r.timestamp);

    match latest {
        Some(r) if r.kind == AttendanceType::CheckIn => AttendanceType::CheckOut,
        _ => AttendanceType::CheckIn,
    }
}

/// A record whose type breaks the per-day alternation.
#[derive(Debug, Clone, PartialEq)]
pub struct AlternationViolation {
    pub record_id: String,
    pub face_id: String,
    pub date: NaiveDate,
    pub expected: AttendanceType,
    pub found: AttendanceType,
}

/// Scan every `(face_id, date)` group in timestamp order and report records
/// that do not follow check-in, check-out, check-in, ...
///
/// The ledger never repairs itself after an out-of-order delete; this is how
/// such damage is found.
pub fn alternation_violations(records: &[AttendanceRecord]) -> Vec<AlternationViolation> {
    let mut groups: BTreeMap<(&str, NaiveDate), Vec<&AttendanceRecord>> = BTreeMap::new();
    for r in records {
        groups
            .entry((r.face_id.as_str(), r.date))
            .or_default()
            .push(r);
    }

    let mut violations = Vec::new();
    for ((face_id, date), mut group) in groups {
        // Stable: equal timestamps keep insertion order.
        group.sort_by_key(|r| r.timestamp);
        let mut expected = AttendanceType::CheckIn;
        for r in group {
            if r.kind != expected {
                violations.push(AlternationViolation {
                    record_id: r.id.clone(),
                    face_id: face_id.to_string(),
                    date,
                    expected,
                    found: r.kind,
                });
            }
            // Resync on what is actually there so one bad record is one violation.
            expected = r.kind.opposite();
        }
    }
    violations
}
