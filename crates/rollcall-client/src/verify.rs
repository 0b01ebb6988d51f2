use crate::backend::{RecognitionBackend, VerificationResult};
use rollcall_capture::EncodedImage;
use std::sync::Arc;

/// Verification as seen by the attendance pipeline: always a result,
/// never a transport error.
#[derive(Clone)]
pub struct VerificationClient {
    backend: Arc<dyn RecognitionBackend>,
}

impl VerificationClient {
    pub fn new(backend: Arc<dyn RecognitionBackend>) -> Self {
        Self { backend }
    }

    pub async fn verify(&self, image: &EncodedImage) -> VerificationResult {
        match self.backend.verify(image).await {
            Ok(result) => normalize(result),
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %e,
                    "verification unavailable"
                );
                VerificationResult::unavailable(format!("verification service unavailable: {e}"))
            }
        }
    }
}

/// Bring a service answer into the shape the pipeline relies on.
///
/// - confidence above 1 is a percentage (the service reports similarity
///   0–100) and is scaled down; the result is clamped to [0, 1]
/// - a failed call is never a match
/// - a match without a face id is not usable and becomes a non-match
pub fn normalize(mut result: VerificationResult) -> VerificationResult {
    let mut confidence = result.confidence;
    if !confidence.is_finite() {
        confidence = 0.0;
    } else if confidence > 1.0 {
        confidence /= 100.0;
    }
    result.confidence = confidence.clamp(0.0, 1.0);

    if !result.success {
        result.matched = false;
    }

    let has_face_id = result.face_id.as_deref().is_some_and(|id| !id.is_empty());
    if result.matched && !has_face_id {
        tracing::warn!(
            "service reported a match without a face id; treating as no match"
        );
        result.matched = false;
        result.message = Some("Face matched but no identity was returned".to_string());
    }
    result
}
