//! The attendance desk: verify a captured face, decide check-in or
//! check-out, record it, mirror it upstream.

use crate::backend::{RecognitionBackend, RegistrationResult, VerificationResult};
use crate::register::RegistrationClient;
use crate::sync::{self, AttendanceSink, SyncStatus};
use crate::verify::VerificationClient;
use rollcall_capture::EncodedImage;
use rollcall_core::{AttendanceRecord, Classifier, Clock, IdentityDraft, Person};
use rollcall_store::{LedgerStore, StoreError};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("failed to save attendance: {0}")]
    Store(#[from] StoreError),
}

/// What happened when someone stepped up to the camera.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    /// A record was stored locally.
    Marked {
        record: AttendanceRecord,
        sync: SyncStatus,
    },
    /// The service answered but did not recognize the face.
    NotRecognized { confidence: f64, message: String },
    /// No answer could be obtained (no fallback configured).
    Unavailable { message: String },
}

/// Verification, registration and the ledger, wired together.
pub struct AttendanceDesk {
    store: Arc<LedgerStore>,
    verifier: VerificationClient,
    registrar: RegistrationClient,
    sink: Option<Arc<dyn AttendanceSink>>,
    classifier: Classifier,
}

impl AttendanceDesk {
    pub fn new(
        store: Arc<LedgerStore>,
        backend: Arc<dyn RecognitionBackend>,
        sink: Option<Arc<dyn AttendanceSink>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier: VerificationClient::new(backend.clone()),
            registrar: RegistrationClient::new(backend, store.clone(), clock.clone()),
            classifier: Classifier::new(clock),
            store,
            sink,
        }
    }

    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Mark attendance for whoever is in `image`.
    ///
    /// Only a failed local write is an error. Sync problems are reported in
    /// the outcome and leave the stored record in place.
    pub async fn mark(&self, image: &EncodedImage) -> Result<MarkOutcome, DeskError> {
        let verification = self.verifier.verify(image).await;

        if !verification.success {
            return Ok(MarkOutcome::Unavailable {
                message: verification
                    .message
                    .unwrap_or_else(|| "verification failed".to_string()),
            });
        }

        let face_id = match (verification.matched, verification.face_id) {
            (true, Some(face_id)) => face_id,
            _ => {
                tracing::info!(confidence = verification.confidence, "face not recognized");
                return Ok(MarkOutcome::NotRecognized {
                    confidence: verification.confidence,
                    message: verification.message.unwrap_or_else(|| {
                        "Face not recognized. Please ensure you are registered in the system."
                            .to_string()
                    }),
                });
            }
        };

        let person = verification
            .person
            .or_else(|| self.store.find_identity(&face_id).map(|i| i.person()))
            .unwrap_or_else(unknown_person);

        let now = self.classifier.clock().now();
        let confidence = verification.confidence;
        let record = self.store.append_with(|records| {
            let kind = self.classifier.classify_at(&face_id, now, records);
            AttendanceRecord::new(
                uuid::Uuid::now_v7().to_string(),
                face_id.as_str(),
                person,
                now,
                kind,
                confidence,
            )
        })?;

        tracing::info!(
            id = %record.id,
            face_id = %record.face_id,
            kind = %record.kind,
            confidence = record.confidence,
            "attendance marked"
        );

        let sync = sync::mirror(self.sink.as_deref(), &record).await;
        Ok(MarkOutcome::Marked { record, sync })
    }

    /// Identify the face in `image` without recording anything.
    pub async fn verify(&self, image: &EncodedImage) -> VerificationResult {
        self.verifier.verify(image).await
    }

    /// Register a new face. See [`RegistrationClient::register`].
    pub async fn register(
        &self,
        draft: &IdentityDraft,
        image: &EncodedImage,
    ) -> Result<RegistrationResult, DeskError> {
        Ok(self.registrar.register(draft, image).await?)
    }
}

fn unknown_person() -> Person {
    Person {
        first_name: "Unknown".to_string(),
        last_name: "Unknown".to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FallbackBackend;
    use crate::simulated::SimulatedBackend;
    use crate::testing::{image, matched, person, RecordingSink, ScriptedBackend};
    use chrono::{DateTime, TimeZone, Utc};
    use rollcall_core::classifier::alternation_violations;
    use rollcall_core::{AttendanceType, FixedClock, Identity};
    use rollcall_store::MemoryKv;
    use std::collections::HashSet;
    use std::time::Duration;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap()
    }

    fn ledger() -> LedgerStore {
        LedgerStore::in_memory()
    }

    struct Fixture {
        desk: AttendanceDesk,
        clock: Arc<FixedClock>,
        sink: Arc<RecordingSink>,
    }

    fn fixture(result: VerificationResult, store: LedgerStore, sink: RecordingSink) -> Fixture {
        let clock = Arc::new(FixedClock::new(at(1, 9, 0)));
        let sink = Arc::new(sink);
        let desk = AttendanceDesk::new(
            Arc::new(store),
            Arc::new(ScriptedBackend::verifying(result)),
            Some(sink.clone()),
            clock.clone(),
        );
        Fixture { desk, clock, sink }
    }

    async fn mark_at(f: &Fixture, when: DateTime<Utc>) -> AttendanceRecord {
        f.clock.set(when);
        match f.desk.mark(&image()).await.unwrap() {
            MarkOutcome::Marked { record, .. } => record,
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_day_scenario() {
        let f = fixture(matched("F1", 0.92), ledger(), RecordingSink::ok());

        let first = mark_at(&f, at(1, 9, 0)).await;
        let second = mark_at(&f, at(1, 17, 0)).await;
        let third = mark_at(&f, at(1, 17, 5)).await;
        let next_day = mark_at(&f, at(2, 8, 30)).await;

        assert_eq!(first.kind, AttendanceType::CheckIn);
        assert_eq!(second.kind, AttendanceType::CheckOut);
        assert_eq!(third.kind, AttendanceType::CheckIn);
        assert_eq!(next_day.kind, AttendanceType::CheckIn);

        assert_eq!(third.time.to_string(), "17:05:00");
        assert_eq!(third.date.to_string(), "2024-01-01");
        assert_eq!(third.person.full_name(), "A B");

        let stored = f.desk.store().list_all();
        assert_eq!(stored.len(), 4);
        let ids: HashSet<_> = stored.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(f.sink.pushed.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_verify_leaves_ledger_untouched() {
        let f = fixture(matched("F1", 97.5), ledger(), RecordingSink::ok());

        let result = f.desk.verify(&image()).await;
        assert!(result.matched);
        assert_eq!(result.face_id.as_deref(), Some("F1"));
        assert!((result.confidence - 0.975).abs() < 1e-9);
        assert!(f.desk.store().list_all().is_empty());
        assert!(f.sink.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_not_recognized_records_nothing() {
        let miss = VerificationResult {
            success: true,
            matched: false,
            confidence: 0.41,
            ..Default::default()
        };
        let f = fixture(miss, ledger(), RecordingSink::ok());

        let outcome = f.desk.mark(&image()).await.unwrap();
        assert!(matches!(outcome, MarkOutcome::NotRecognized { .. }));
        assert!(f.desk.store().list_all().is_empty());
        assert!(f.sink.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sync_failure_keeps_record() {
        let f = fixture(matched("F1", 0.9), ledger(), RecordingSink::failing());

        match f.desk.mark(&image()).await.unwrap() {
            MarkOutcome::Marked { sync, .. } => assert!(matches!(sync, SyncStatus::Failed(_))),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.desk.store().list_all().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let kv = MemoryKv::new();
        let store = LedgerStore::open(Box::new(kv), Some(16)).unwrap();
        let f = fixture(matched("F1", 0.9), store, RecordingSink::ok());

        let err = f.desk.mark(&image()).await.unwrap_err();
        assert!(matches!(
            err,
            DeskError::Store(StoreError::QuotaExceeded { .. })
        ));
        assert!(f.desk.store().list_all().is_empty());
        assert!(f.sink.pushed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_without_fallback() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at(1, 9, 0)));
        let desk = AttendanceDesk::new(
            Arc::new(LedgerStore::in_memory()),
            Arc::new(ScriptedBackend::unreachable()),
            None,
            clock,
        );
        let outcome = desk.mark(&image()).await.unwrap();
        assert!(matches!(outcome, MarkOutcome::Unavailable { .. }));
        assert!(desk.store().list_all().is_empty());
    }

    #[tokio::test]
    async fn test_person_filled_from_registered_identity() {
        let store = LedgerStore::in_memory();
        let grace = Identity::from_draft("F7", &person("Grace", "Hopper"), at(1, 8, 0), None);
        store.append_identity(grace).unwrap();
        let mut bare = matched("F7", 0.88);
        bare.person = None;
        let f = fixture(bare, store, RecordingSink::ok());

        let record = mark_at(&f, at(1, 9, 0)).await;
        assert_eq!(record.person.full_name(), "Grace Hopper");
    }

    #[tokio::test]
    async fn test_register_then_mark_with_simulated_fallback() {
        let store = Arc::new(LedgerStore::in_memory());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at(1, 9, 0)));
        let sim = SimulatedBackend::new(store.clone(), clock.clone())
            .with_seed(5)
            .with_delay(Duration::ZERO);
        let primary = Arc::new(ScriptedBackend::unreachable());
        let backend = FallbackBackend::new(primary, Arc::new(sim));
        let desk = AttendanceDesk::new(store.clone(), Arc::new(backend), None, clock);

        let mut registered = false;
        for _ in 0..10 {
            let draft = person("A", "B");
            if desk.register(&draft, &image()).await.unwrap().success {
                registered = true;
                break;
            }
        }
        assert!(registered);

        // Every outcome is a result; marked records must alternate.
        for _ in 0..30 {
            match desk.mark(&image()).await.unwrap() {
                MarkOutcome::Marked { sync, .. } => assert_eq!(sync, SyncStatus::Disabled),
                MarkOutcome::NotRecognized { .. } => {}
                MarkOutcome::Unavailable { message } => panic!("fallback should answer: {message}"),
            }
        }
        let records = store.list_all();
        assert!(!records.is_empty());
        assert!(alternation_violations(&records).is_empty());
    }
}
