//! rollcall-client: Talks to the face-recognition service and turns its
//! answers into attendance records.
//!
//! The service sits behind [`RecognitionBackend`]. [`HttpBackend`] is the
//! real one, [`SimulatedBackend`] answers from the locally registered
//! identities, and [`FallbackBackend`] chains the two so a missing service
//! never leaves the user without a result.

pub mod backend;
pub mod desk;
pub mod http;
pub mod register;
pub mod simulated;
pub mod sync;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{
    ClientError, FallbackBackend, RecognitionBackend, RegistrationResult, VerificationResult,
};
pub use desk::{AttendanceDesk, DeskError, MarkOutcome};
pub use http::HttpBackend;
pub use register::RegistrationClient;
pub use simulated::SimulatedBackend;
pub use sync::{AttendanceSink, SyncStatus};
pub use verify::VerificationClient;
