//! rollcall-store: Local persistence for the attendance ledger.
//!
//! Two keyed collections (attendance records, registered identities), each
//! kept as a single JSON list and rewritten whole on every mutation.

pub mod kv;
pub mod ledger;

pub use kv::{KvBackend, MemoryKv, SqliteKv};
pub use ledger::{LedgerStore, StoreError, DEFAULT_QUOTA_BYTES};
