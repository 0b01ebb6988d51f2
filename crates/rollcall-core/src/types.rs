use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of attendance event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceType {
    CheckIn,
    CheckOut,
}

impl AttendanceType {
    /// Wire/storage name (`checkin` / `checkout`).
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceType::CheckIn => "checkin",
            AttendanceType::CheckOut => "checkout",
        }
    }

    /// Human-readable label for tables and messages.
    pub fn label(self) -> &'static str {
        match self {
            AttendanceType::CheckIn => "Check In",
            AttendanceType::CheckOut => "Check Out",
        }
    }

    /// The event that must follow this one on the same day.
    pub fn opposite(self) -> Self {
        match self {
            AttendanceType::CheckIn => AttendanceType::CheckOut,
            AttendanceType::CheckOut => AttendanceType::CheckIn,
        }
    }
}

impl fmt::Display for AttendanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAttendanceTypeError(String);

impl fmt::Display for ParseAttendanceTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown attendance type {:?} (expected checkin or checkout)",
            self.0
        )
    }
}

impl std::error::Error for ParseAttendanceTypeError {}

impl FromStr for AttendanceType {
    type Err = ParseAttendanceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "checkin" | "check-in" | "in" => Ok(AttendanceType::CheckIn),
            "checkout" | "check-out" | "out" => Ok(AttendanceType::CheckOut),
            other => Err(ParseAttendanceTypeError(other.to_string())),
        }
    }
}

/// Personal details of a registered person, snapshotted into every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: String,
    pub phone_number: String,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Details entered by the user before a face is registered.
pub type IdentityDraft = Person;

/// A registered face. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub face_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub date_of_birth: String,
    #[serde(default)]
    pub phone_number: String,
    pub registered_at: DateTime<Utc>,
    /// Opaque reference to where the service stored the enrollment image.
    #[serde(rename = "s3Key", default, skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
}

impl Identity {
    pub fn from_draft(
        face_id: impl Into<String>,
        draft: &IdentityDraft,
        registered_at: DateTime<Utc>,
        storage_ref: Option<String>,
    ) -> Self {
        Self {
            face_id: face_id.into(),
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            date_of_birth: draft.date_of_birth.clone(),
            phone_number: draft.phone_number.clone(),
            registered_at,
            storage_ref,
        }
    }

    /// Snapshot of the personal fields, as carried by attendance records.
    pub fn person(&self) -> Person {
        Person {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            date_of_birth: self.date_of_birth.clone(),
            phone_number: self.phone_number.clone(),
        }
    }
}

/// One check-in or check-out event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub face_id: String,
    pub person: Person,
    pub timestamp: DateTime<Utc>,
    /// Calendar day of `timestamp`.
    pub date: NaiveDate,
    /// Clock component of `timestamp`, whole seconds.
    pub time: NaiveTime,
    #[serde(rename = "type")]
    pub kind: AttendanceType,
    /// Match confidence in [0, 1].
    pub confidence: f64,
}

impl AttendanceRecord {
    /// Build a record, deriving `date` and `time` from `timestamp`.
    pub fn new(
        id: impl Into<String>,
        face_id: impl Into<String>,
        person: Person,
        timestamp: DateTime<Utc>,
        kind: AttendanceType,
        confidence: f64,
    ) -> Self {
        let time = timestamp.time();
        Self {
            id: id.into(),
            face_id: face_id.into(),
            person,
            date: timestamp.date_naive(),
            time: time.with_nanosecond(0).unwrap_or(time),
            timestamp,
            kind,
            confidence,
        }
    }
}
