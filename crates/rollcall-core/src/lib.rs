//! rollcall-core: Attendance domain model and the logic that sits on top of it.
//!
//! Decides whether a recognized face is checking in or out, validates the
//! per-day alternation of a ledger, and renders the ledger for people
//! (filters, daily stats, CSV export).

pub mod classifier;
pub mod export;
pub mod report;
pub mod types;

pub use classifier::{Classifier, Clock, FixedClock, SystemClock};
pub use types::{AttendanceRecord, AttendanceType, Identity, IdentityDraft, Person};
