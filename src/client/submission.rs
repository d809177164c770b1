//! Guest upload form: name, message, and a list of pending attachments.
//!
//! Each attachment is its own request with its own outcome. Submitting again
//! after a partial failure resends only what has not gone through yet.

use crate::client::voice::AcceptedRecording;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// A file as the guest picked, dropped, or recorded it.
#[derive(Clone, Debug, PartialEq)]
pub struct AttachmentFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Clone, Debug)]
pub struct PendingAttachment {
    pub id: Uuid,
    pub file: AttachmentFile,
    pub in_progress: bool,
    pub uploaded: bool,
    pub error: Option<String>,
}

impl PendingAttachment {
    fn new(file: AttachmentFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            file,
            in_progress: false,
            uploaded: false,
            error: None,
        }
    }
}

/// One request to the upload endpoint.
#[derive(Clone, Copy, Debug)]
pub struct Submission<'a> {
    pub guest_name: &'a str,
    pub message: &'a str,
    pub file: Option<&'a AttachmentFile>,
    pub message_only: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The server answered with an error description.
    #[error("{0}")]
    Rejected(String),
    /// The request never produced an answer.
    #[error("{0}")]
    Unreachable(String),
}

/// Sends one submission to the upload endpoint.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(&self, submission: Submission<'_>) -> Result<(), TransportError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("attachment `{0}` is not pending")]
    UnknownAttachment(Uuid),
    #[error("attachment `{0}` was already uploaded")]
    AlreadyUploaded(Uuid),
}

/// Result of one `submit` pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    /// Requests that succeeded during this pass.
    pub sent: usize,
    /// Requests that failed during this pass.
    pub failed: usize,
    /// Attachments left alone because they had already gone through.
    pub skipped: usize,
    /// Whether this pass was a single message-only request.
    pub message_only: bool,
    /// Error of the message-only request, if it failed.
    pub message_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct UploadForm {
    pub guest_name: String,
    pub message: String,
    attachments: Vec<PendingAttachment>,
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attachments(&self) -> &[PendingAttachment] {
        &self.attachments
    }

    pub fn attachment(&self, id: Uuid) -> Option<&PendingAttachment> {
        self.attachments.iter().find(|a| a.id == id)
    }

    /// Append files in order. Same-named files are kept side by side.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = AttachmentFile>) -> Vec<Uuid> {
        files
            .into_iter()
            .map(|file| {
                let pending = PendingAttachment::new(file);
                let id = pending.id;
                self.attachments.push(pending);
                id
            })
            .collect()
    }

    /// Queue a finished voice recording like any other file.
    pub fn attach_recording(&mut self, recording: AcceptedRecording) -> Uuid {
        debug!(
            "attaching {}s voice message {}",
            recording.duration_secs, recording.file.name
        );
        self.add_files([recording.file])[0]
    }

    /// Drop a pending attachment. Uploaded attachments stay.
    pub fn remove(&mut self, id: Uuid) -> Result<AttachmentFile, SubmissionError> {
        let index = self
            .attachments
            .iter()
            .position(|a| a.id == id)
            .ok_or(SubmissionError::UnknownAttachment(id))?;
        if self.attachments[index].uploaded {
            return Err(SubmissionError::AlreadyUploaded(id));
        }
        Ok(self.attachments.remove(index).file)
    }

    /// True once every attachment has gone through (and there is at least one).
    pub fn all_uploaded(&self) -> bool {
        !self.attachments.is_empty() && self.attachments.iter().all(|a| a.uploaded)
    }

    /// Send everything not yet sent.
    ///
    /// With no attachments this is one message-only request; on success the
    /// name and message are cleared. Otherwise each unsent attachment goes out
    /// on its own, in order, and only its own state changes.
    pub async fn submit(&mut self, transport: &impl UploadTransport) -> SubmitReport {
        if self.attachments.is_empty() {
            return self.submit_message_only(transport).await;
        }

        let mut report = SubmitReport::default();
        for index in 0..self.attachments.len() {
            if self.attachments[index].uploaded {
                report.skipped += 1;
                continue;
            }

            self.attachments[index].in_progress = true;
            let outcome = transport
                .send(Submission {
                    guest_name: &self.guest_name,
                    message: &self.message,
                    file: Some(&self.attachments[index].file),
                    message_only: false,
                })
                .await;

            let attachment = &mut self.attachments[index];
            attachment.in_progress = false;
            match outcome {
                Ok(()) => {
                    attachment.uploaded = true;
                    attachment.error = None;
                    report.sent += 1;
                }
                Err(err) => {
                    warn!("upload of {} failed: {}", attachment.file.name, err);
                    attachment.error = Some(err.to_string());
                    report.failed += 1;
                }
            }
        }
        report
    }

    async fn submit_message_only(&mut self, transport: &impl UploadTransport) -> SubmitReport {
        let outcome = transport
            .send(Submission {
                guest_name: &self.guest_name,
                message: &self.message,
                file: None,
                message_only: true,
            })
            .await;

        let mut report = SubmitReport {
            message_only: true,
            ..SubmitReport::default()
        };
        match outcome {
            Ok(()) => {
                self.guest_name.clear();
                self.message.clear();
                report.sent = 1;
            }
            Err(err) => {
                warn!("message submission failed: {}", err);
                report.failed = 1;
                report.message_error = Some(err.to_string());
            }
        }
        report
    }
}
