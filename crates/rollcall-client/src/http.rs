//! JSON-over-HTTP client for the recognition service.
//!
//! Endpoints, relative to the configured base URL:
//! `POST /verify`, `POST /register`, `POST /attendance`.

use crate::backend::{ClientError, RecognitionBackend, RegistrationResult, VerificationResult};
use crate::sync::{AttendancePayload, AttendanceSink};
use async_trait::async_trait;
use reqwest::Client;
use rollcall_capture::EncodedImage;
use rollcall_core::{AttendanceRecord, IdentityDraft};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    image: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    first_name: &'a str,
    last_name: &'a str,
    date_of_birth: &'a str,
    phone_number: &'a str,
    image: &'a str,
}

/// The real recognition service.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!(%url, "POST");

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text)
            .map_err(|e| ClientError::Malformed(format!("{path}: {e}")))
    }
}

#[async_trait]
impl RecognitionBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn verify(&self, image: &EncodedImage) -> Result<VerificationResult, ClientError> {
        let data_url = image.to_data_url();
        let request = VerifyRequest { image: &data_url };
        self.post_json("verify", &request).await
    }

    async fn register(
        &self,
        draft: &IdentityDraft,
        image: &EncodedImage,
    ) -> Result<RegistrationResult, ClientError> {
        let data_url = image.to_data_url();
        let request = RegisterRequest {
            first_name: &draft.first_name,
            last_name: &draft.last_name,
            date_of_birth: &draft.date_of_birth,
            phone_number: &draft.phone_number,
            image: &data_url,
        };
        self.post_json("register", &request).await
    }
}

#[async_trait]
impl AttendanceSink for HttpBackend {
    async fn push(&self, record: &AttendanceRecord) -> Result<(), ClientError> {
        // The body is only logged; any 2xx JSON answer counts as stored.
        let ack: serde_json::Value = self
            .post_json("attendance", &AttendancePayload::from(record))
            .await?;
        tracing::debug!(response = %ack, "attendance accepted");
        Ok(())
    }
}
