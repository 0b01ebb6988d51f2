//! Best-effort upload of attendance records to the remote service.

use crate::backend::ClientError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rollcall_core::{AttendanceRecord, AttendanceType, Person};
use serde::Serialize;

/// Where marked attendance is mirrored after it is stored locally.
#[async_trait]
pub trait AttendanceSink: Send + Sync {
    async fn push(&self, record: &AttendanceRecord) -> Result<(), ClientError>;
}

/// How the mirror upload of a record went. Never affects the local ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    Failed(String),
    Disabled,
}

/// Body of `POST /attendance`: the record without its local id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AttendancePayload<'a> {
    pub face_id: &'a str,
    pub person: &'a Person,
    #[serde(rename = "type")]
    pub kind: AttendanceType,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl<'a> From<&'a AttendanceRecord> for AttendancePayload<'a> {
    fn from(r: &'a AttendanceRecord) -> Self {
        Self {
            face_id: &r.face_id,
            person: &r.person,
            kind: r.kind,
            confidence: r.confidence,
            timestamp: r.timestamp,
            date: r.date,
            time: r.time,
        }
    }
}

/// Push `record` to `sink` if there is one. Failures are logged and
/// reported, never propagated.
pub async fn mirror(sink: Option<&dyn AttendanceSink>, record: &AttendanceRecord) -> SyncStatus {
    let Some(sink) = sink else {
        return SyncStatus::Disabled;
    };
    match sink.push(record).await {
        Ok(()) => {
            tracing::info!(id = %record.id, "attendance synced to backend");
            SyncStatus::Synced
        }
        Err(e) => {
            tracing::warn!(id = %record.id, error = %e, "failed to sync attendance to backend");
            SyncStatus::Failed(e.to_string())
        }
    }
}
