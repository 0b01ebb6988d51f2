use crate::kv::{KvBackend, MemoryKv};
use rollcall_core::{AttendanceRecord, Identity};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

/// Key of the attendance record collection.
pub const RECORDS_KEY: &str = "attendanceRecords";
/// Key of the registered identity collection.
pub const IDENTITIES_KEY: &str = "registeredFaces";
/// Per-collection size limit, matching what browsers give local storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("collection {key} is not valid JSON: {source}")]
    Corrupt {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize collection {key}: {source}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("storage quota exceeded: {key} needs {needed} bytes, quota is {quota}")]
    QuotaExceeded {
        key: &'static str,
        needed: usize,
        quota: usize,
    },
}

struct Inner {
    kv: Box<dyn KvBackend>,
    records: Vec<AttendanceRecord>,
    identities: Vec<Identity>,
}

/// The local ledger: attendance records plus registered identities.
///
/// Both collections are read once on open and kept in memory. Each mutation
/// serializes the full collection and overwrites it in the backend; the
/// in-memory copy only changes once that write has succeeded.
///
/// Internally synchronized, so it is shared as `Arc<LedgerStore>` between
/// the components that need it.
pub struct LedgerStore {
    inner: Mutex<Inner>,
    quota: Option<usize>,
}

impl LedgerStore {
    /// Load both collections from `kv`. A missing key is an empty collection.
    pub fn open(kv: Box<dyn KvBackend>, quota: Option<usize>) -> Result<Self, StoreError> {
        let records: Vec<AttendanceRecord> = read_collection(kv.as_ref(), RECORDS_KEY)?;
        let identities: Vec<Identity> = read_collection(kv.as_ref(), IDENTITIES_KEY)?;
        tracing::info!(
            records = records.len(),
            identities = identities.len(),
            "ledger loaded"
        );
        Ok(Self {
            inner: Mutex::new(Inner {
                kv,
                records,
                identities,
            }),
            quota,
        })
    }

    /// Empty ledger over a [`MemoryKv`], with the default quota.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                kv: Box::new(MemoryKv::new()),
                records: Vec::new(),
                identities: Vec::new(),
            }),
            quota: Some(DEFAULT_QUOTA_BYTES),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Mutations commit only after a successful write, so a poisoned
        // guard still holds consistent data.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a record as-is. No dedup, no alternation check.
    pub fn append(&self, record: AttendanceRecord) -> Result<(), StoreError> {
        self.append_with(|_| record).map(|_| ())
    }

    /// Build a record from the current ledger and append it, holding the
    /// lock across both so nothing can slip in between.
    pub fn append_with<F>(&self, build: F) -> Result<AttendanceRecord, StoreError>
    where
        F: FnOnce(&[AttendanceRecord]) -> AttendanceRecord,
    {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let record = build(&inner.records);

        inner.records.push(record.clone());
        if let Err(e) = write_collection(
            inner.kv.as_mut(),
            RECORDS_KEY,
            &inner.records,
            self.quota,
        ) {
            inner.records.pop();
            return Err(e);
        }
        tracing::debug!(
            id = %record.id,
            face_id = %record.face_id,
            kind = %record.kind,
            "record appended"
        );
        Ok(record)
    }

    /// All records in insertion order.
    pub fn list_all(&self) -> Vec<AttendanceRecord> {
        self.lock().records.clone()
    }

    /// Delete the record with `id`. Returns `false` (and writes nothing) if
    /// there is none. Later records of the same face and day are not
    /// adjusted.
    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let Some(pos) = inner.records.iter().position(|r| r.id == id) else {
            return Ok(false);
        };

        let removed = inner.records.remove(pos);
        if let Err(e) = write_collection(
            inner.kv.as_mut(),
            RECORDS_KEY,
            &inner.records,
            self.quota,
        ) {
            inner.records.insert(pos, removed);
            return Err(e);
        }
        tracing::debug!(id, "record removed");
        Ok(true)
    }

    pub fn list_identities(&self) -> Vec<Identity> {
        self.lock().identities.clone()
    }

    pub fn find_identity(&self, face_id: &str) -> Option<Identity> {
        self.lock()
            .identities
            .iter()
            .find(|i| i.face_id == face_id)
            .cloned()
    }

    pub fn append_identity(&self, identity: Identity) -> Result<(), StoreError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let face_id = identity.face_id.clone();

        inner.identities.push(identity);
        if let Err(e) = write_collection(
            inner.kv.as_mut(),
            IDENTITIES_KEY,
            &inner.identities,
            self.quota,
        ) {
            inner.identities.pop();
            return Err(e);
        }
        tracing::debug!(face_id = %face_id, "identity stored");
        Ok(())
    }

    /// Drop every identity with `face_id`. Attendance records that refer to
    /// it are kept.
    pub fn remove_identity(&self, face_id: &str) -> Result<bool, StoreError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let before = inner.identities.clone();

        inner.identities.retain(|i| i.face_id != face_id);
        if inner.identities.len() == before.len() {
            return Ok(false);
        }
        if let Err(e) = write_collection(
            inner.kv.as_mut(),
            IDENTITIES_KEY,
            &inner.identities,
            self.quota,
        ) {
            inner.identities = before;
            return Err(e);
        }
        tracing::info!(face_id, "identity removed");
        Ok(true)
    }
}

fn read_collection<T: DeserializeOwned>(
    kv: &dyn KvBackend,
    key: &'static str,
) -> Result<Vec<T>, StoreError> {
    match kv.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|source| StoreError::Corrupt { key, source }),
        None => Ok(Vec::new()),
    }
}

fn write_collection<T: Serialize>(
    kv: &mut dyn KvBackend,
    key: &'static str,
    items: &[T],
    quota: Option<usize>,
) -> Result<(), StoreError> {
    let json = serde_json::to_string(items)
        .map_err(|source| StoreError::Serialize { key, source })?;
    if let Some(quota) = quota {
        if json.len() > quota {
            tracing::warn!(key, bytes = json.len(), quota, "storage quota exceeded");
            return Err(StoreError::QuotaExceeded {
                key,
                needed: json.len(),
                quota,
            });
        }
    }
    kv.set(key, &json)?;
    tracing::trace!(key, bytes = json.len(), "collection written");
    Ok(())
}
