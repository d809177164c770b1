//! `reqwest` transport for the guest upload form.

use crate::client::submission::{Submission, TransportError, UploadTransport};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

const FALLBACK_ERROR: &str = "Upload failed";

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Posts each submission as multipart to `{server}/api/upload`.
#[derive(Clone)]
pub struct HttpUploadClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpUploadClient {
    pub fn new(server: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("{}/api/upload", server.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn form(submission: Submission<'_>) -> Result<Form, TransportError> {
        let mut form = Form::new()
            .text("guestName", submission.guest_name.to_string())
            .text("message", submission.message.to_string());

        if submission.message_only {
            form = form.text("messageOnly", "true");
        }

        if let Some(file) = submission.file {
            let mut part = Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
            if let Some(content_type) = &file.content_type {
                part = part
                    .mime_str(content_type)
                    .map_err(|err| TransportError::Unreachable(err.to_string()))?;
            }
            form = form.part("file", part);
        }

        Ok(form)
    }
}

#[async_trait]
impl UploadTransport for HttpUploadClient {
    async fn send(&self, submission: Submission<'_>) -> Result<(), TransportError> {
        let form = Self::form(submission)?;
        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|err| TransportError::Unreachable(err.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let reason = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| FALLBACK_ERROR.to_string());
        Err(TransportError::Rejected(reason))
    }
}
