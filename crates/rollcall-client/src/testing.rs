//! Test doubles shared by the unit tests of this crate.

use crate::backend::{ClientError, RecognitionBackend, RegistrationResult, VerificationResult};
use crate::sync::AttendanceSink;
use async_trait::async_trait;
use rollcall_capture::EncodedImage;
use rollcall_core::{AttendanceRecord, IdentityDraft, Person};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::net::TcpListener;

pub(crate) fn image() -> EncodedImage {
    EncodedImage {
        mime: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
    }
}

pub(crate) fn person(first: &str, last: &str) -> Person {
    Person {
        first_name: first.into(),
        last_name: last.into(),
        ..Default::default()
    }
}

pub(crate) fn matched(face_id: &str, confidence: f64) -> VerificationResult {
    VerificationResult {
        success: true,
        matched: true,
        confidence,
        face_id: Some(face_id.to_string()),
        person: Some(person("A", "B")),
        message: None,
    }
}

/// Backend that replays fixed answers; `None` means "unreachable".
pub(crate) struct ScriptedBackend {
    verify: Option<VerificationResult>,
    register: Option<RegistrationResult>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn unreachable() -> Self {
        Self {
            verify: None,
            register: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn verifying(result: VerificationResult) -> Self {
        Self {
            verify: Some(result),
            ..Self::unreachable()
        }
    }

    pub(crate) fn registering(result: RegistrationResult) -> Self {
        Self {
            register: Some(result),
            ..Self::unreachable()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn outage() -> ClientError {
        ClientError::Status {
            status: 503,
            body: "scripted outage".to_string(),
        }
    }
}

#[async_trait]
impl RecognitionBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn verify(&self, _image: &EncodedImage) -> Result<VerificationResult, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verify.clone().ok_or_else(Self::outage)
    }

    async fn register(
        &self,
        _draft: &IdentityDraft,
        _image: &EncodedImage,
    ) -> Result<RegistrationResult, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.register.clone().ok_or_else(Self::outage)
    }
}

/// Sink that remembers what it was given, or fails every push.
pub(crate) struct RecordingSink {
    fail: bool,
    pub(crate) pushed: Mutex<Vec<AttendanceRecord>>,
}

impl RecordingSink {
    pub(crate) fn ok() -> Self {
        Self {
            fail: false,
            pushed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            pushed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AttendanceSink for RecordingSink {
    async fn push(&self, record: &AttendanceRecord) -> Result<(), ClientError> {
        if self.fail {
            return Err(ClientError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        self.pushed.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// A base URL nothing listens on.
pub(crate) async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
