//! Stand-in for the recognition service, answering from the local ledger.
//!
//! Keeps the tool usable without a live backend. Matches are drawn at
//! random from the registered identities, so this is a demo mode, not
//! recognition.

use crate::backend::{ClientError, RecognitionBackend, RegistrationResult, VerificationResult};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rollcall_capture::EncodedImage;
use rollcall_core::{Clock, IdentityDraft};
use rollcall_store::LedgerStore;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Probability that a verification is reported as a match.
pub const MATCH_RATE: f64 = 0.7;
/// Probability that a registration is accepted.
pub const REGISTER_SUCCESS_RATE: f64 = 0.9;

pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_REGISTER_DELAY: Duration = Duration::from_millis(2000);

pub struct SimulatedBackend {
    store: Arc<LedgerStore>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
    verify_delay: Duration,
    register_delay: Duration,
}

impl SimulatedBackend {
    pub fn new(store: Arc<LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
            verify_delay: DEFAULT_VERIFY_DELAY,
            register_delay: DEFAULT_REGISTER_DELAY,
        }
    }

    /// Reproducible draws.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Override both simulated latencies.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self.register_delay = delay;
        self
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }
}

#[async_trait]
impl RecognitionBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn verify(&self, _image: &EncodedImage) -> Result<VerificationResult, ClientError> {
        tokio::time::sleep(self.verify_delay).await;

        let faces = self.store.list_identities();
        if faces.is_empty() {
            return Ok(VerificationResult {
                success: true,
                matched: false,
                confidence: 0.0,
                message: Some(
                    "No faces registered in the system yet. Please register a face first."
                        .to_string(),
                ),
                ..Default::default()
            });
        }

        let (is_match, confidence, pick) = self.with_rng(|rng| {
            let is_match = rng.gen_bool(MATCH_RATE);
            let base = if is_match { 0.7 } else { 0.3 };
            let confidence = base + rng.gen::<f64>() * 0.3;
            (is_match, confidence, rng.gen_range(0..faces.len()))
        });

        tracing::debug!(
            is_match,
            confidence,
            candidates = faces.len(),
            "simulated verification"
        );

        if !is_match {
            return Ok(VerificationResult {
                success: true,
                matched: false,
                confidence,
                message: Some(
                    "No matching face found in the database (simulated)"
                        .to_string(),
                ),
                ..Default::default()
            });
        }

        let face = &faces[pick];
        Ok(VerificationResult {
            success: true,
            matched: true,
            confidence,
            face_id: Some(face.face_id.clone()),
            person: Some(face.person()),
            message: Some("Face verified successfully (simulated)".to_string()),
        })
    }

    async fn register(
        &self,
        draft: &IdentityDraft,
        _image: &EncodedImage,
    ) -> Result<RegistrationResult, ClientError> {
        tokio::time::sleep(self.register_delay).await;

        let (accepted, suffix) = self.with_rng(|rng| {
            let accepted = rng.gen_bool(REGISTER_SUCCESS_RATE);
            (accepted, rng.gen_range(0..10_000u32))
        });
        if !accepted {
            tracing::debug!(name = %draft.full_name(), "simulated registration rejected");
            return Ok(RegistrationResult::rejected(
                "Registration failed (simulated)",
            ));
        }

        let face_id = format!("face_{}_{suffix:04}", self.clock.now().timestamp_millis());
        Ok(RegistrationResult {
            success: true,
            storage_ref: Some(format!("faces/{face_id}.jpg")),
            face_id: Some(face_id),
            error: None,
            message: Some("Face registered successfully (simulated)".to_string()),
        })
    }
}
