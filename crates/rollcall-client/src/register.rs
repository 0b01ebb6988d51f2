use crate::backend::{RecognitionBackend, RegistrationResult};
use rollcall_capture::EncodedImage;
use rollcall_core::{Clock, Identity, IdentityDraft};
use rollcall_store::{LedgerStore, StoreError};
use std::sync::Arc;

/// Registers faces and keeps the local identity list in step.
#[derive(Clone)]
pub struct RegistrationClient {
    backend: Arc<dyn RecognitionBackend>,
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
}

impl RegistrationClient {
    pub fn new(
        backend: Arc<dyn RecognitionBackend>,
        store: Arc<LedgerStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            store,
            clock,
        }
    }

    /// Register `draft` with the captured `image`.
    ///
    /// An accepted registration is stored locally exactly once. A rejection
    /// or an unreachable service comes back as `success: false` with an
    /// error message and stores nothing. Only a failed local write is an
    /// `Err`.
    pub async fn register(
        &self,
        draft: &IdentityDraft,
        image: &EncodedImage,
    ) -> Result<RegistrationResult, StoreError> {
        let result = match self.backend.register(draft, image).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "registration unavailable"
                );
                return Ok(RegistrationResult::rejected(format!(
                    "registration service unavailable: {e}"
                )));
            }
        };

        if !result.success {
            let reason = result
                .error
                .clone()
                .or_else(|| result.message.clone())
                .unwrap_or_else(|| "Registration failed".to_string());
            tracing::info!(name = %draft.full_name(), reason = %reason, "registration rejected");
            return Ok(RegistrationResult {
                error: Some(reason),
                ..result
            });
        }

        let Some(face_id) = result.face_id.clone().filter(|id| !id.is_empty()) else {
            tracing::warn!("service accepted registration without a face id");
            return Ok(RegistrationResult::rejected(
                "Registration accepted but no face id was returned",
            ));
        };

        let identity = Identity::from_draft(
            face_id.as_str(),
            draft,
            self.clock.now(),
            result.storage_ref.clone(),
        );
        self.store.append_identity(identity)?;
        tracing::info!(face_id = %face_id, name = %draft.full_name(), "face registered");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FallbackBackend;
    use crate::simulated::SimulatedBackend;
    use crate::testing::{image, person, ScriptedBackend};
    use chrono::{TimeZone, Utc};
    use rollcall_core::FixedClock;
    use rollcall_store::MemoryKv;
    use std::time::Duration;

    fn clock() -> Arc<dyn Clock> {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        Arc::new(FixedClock::new(now))
    }

    fn accepted(face_id: &str) -> RegistrationResult {
        RegistrationResult {
            success: true,
            face_id: Some(face_id.to_string()),
            storage_ref: Some(format!("faces/{face_id}.jpg")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_persists_identity_once() {
        let store = Arc::new(LedgerStore::in_memory());
        let client = RegistrationClient::new(
            Arc::new(ScriptedBackend::registering(accepted("F1"))),
            store.clone(),
            clock(),
        );

        let draft = person("Ada", "Lovelace");
        let r = client.register(&draft, &image()).await.unwrap();
        assert!(r.success);

        let ids = store.list_identities();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].face_id, "F1");
        assert_eq!(ids[0].first_name, "Ada");
        assert_eq!(ids[0].storage_ref.as_deref(), Some("faces/F1.jpg"));
    }

    #[tokio::test]
    async fn test_rejection_persists_nothing() {
        let store = Arc::new(LedgerStore::in_memory());
        let rejected = RegistrationResult::rejected("No face detected");
        let backend = Arc::new(ScriptedBackend::registering(rejected));
        let client = RegistrationClient::new(backend, store.clone(), clock());

        let r = client.register(&person("A", "B"), &image()).await.unwrap();
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("No face detected"));
        assert!(store.list_identities().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_without_fallback() {
        let store = Arc::new(LedgerStore::in_memory());
        let backend = Arc::new(ScriptedBackend::unreachable());
        let client = RegistrationClient::new(backend, store.clone(), clock());

        let r = client.register(&person("A", "B"), &image()).await.unwrap();
        assert!(!r.success);
        assert!(r.error.unwrap().contains("unavailable"));
        assert!(store.list_identities().is_empty());
    }

    #[tokio::test]
    async fn test_simulated_fallback_registration_is_stored() {
        let store = Arc::new(LedgerStore::in_memory());
        let sim = SimulatedBackend::new(store.clone(), clock())
            .with_seed(11)
            .with_delay(Duration::ZERO);
        let primary = Arc::new(ScriptedBackend::unreachable());
        let backend = FallbackBackend::new(primary, Arc::new(sim));
        let client = RegistrationClient::new(Arc::new(backend), store.clone(), clock());

        let mut stored = 0;
        for _ in 0..20 {
            let r = client.register(&person("A", "B"), &image()).await.unwrap();
            if r.success {
                stored += 1;
            }
        }
        assert_eq!(store.list_identities().len(), stored);
        assert!(stored > 0);
    }

    #[tokio::test]
    async fn test_storage_failure_is_error() {
        let kv = MemoryKv::new();
        let store = Arc::new(LedgerStore::open(Box::new(kv), Some(10)).unwrap());
        let client = RegistrationClient::new(
            Arc::new(ScriptedBackend::registering(accepted("F1"))),
            store.clone(),
            clock(),
        );

        let draft = person("A", "B");
        let err = client.register(&draft, &image()).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));
        assert!(store.list_identities().is_empty());
    }
}
