use async_trait::async_trait;
use rollcall_capture::EncodedImage;
use rollcall_core::{IdentityDraft, Person};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Answer to "whose face is this?".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub success: bool,
    #[serde(rename = "match", default)]
    pub matched: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerificationResult {
    /// A result standing in for a verification that could not be carried out.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            success: false,
            matched: false,
            confidence: 0.0,
            face_id: None,
            person: None,
            message: Some(message.into()),
        }
    }
}

/// Answer to a registration request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_id: Option<String>,
    #[serde(
        rename = "s3Key",
        alias = "storageRef",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub storage_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RegistrationResult {
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// A face-recognition service.
///
/// `Err` means the service could not be asked (transport, status, body).
/// A service that was asked and said no returns `Ok` with `success: false`.
#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn verify(&self, image: &EncodedImage) -> Result<VerificationResult, ClientError>;

    async fn register(
        &self,
        draft: &IdentityDraft,
        image: &EncodedImage,
    ) -> Result<RegistrationResult, ClientError>;
}

/// Primary backend with a single fallback attempt.
///
/// Verification falls back whenever the primary does not produce a
/// successful answer. Registration falls back only when the primary could
/// not be reached; an explicit rejection stands.
pub struct FallbackBackend {
    primary: Arc<dyn RecognitionBackend>,
    fallback: Arc<dyn RecognitionBackend>,
}

impl FallbackBackend {
    pub fn new(
        primary: Arc<dyn RecognitionBackend>,
        fallback: Arc<dyn RecognitionBackend>,
    ) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl RecognitionBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn verify(&self, image: &EncodedImage) -> Result<VerificationResult, ClientError> {
        let reason = match self.primary.verify(image).await {
            Ok(result) if result.success => return Ok(result),
            Ok(result) => result
                .message
                .unwrap_or_else(|| "verification failed".to_string()),
            Err(e) => e.to_string(),
        };
        tracing::warn!(
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            error = %reason,
            "verify: primary backend failed; falling back"
        );
        self.fallback.verify(image).await
    }

    async fn register(
        &self,
        draft: &IdentityDraft,
        image: &EncodedImage,
    ) -> Result<RegistrationResult, ClientError> {
        match self.primary.register(draft, image).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %e,
                    "register: primary backend unreachable; falling back"
                );
                self.fallback.register(draft, image).await
            }
        }
    }
}
