//! A single guest contribution: an uploaded file or a text-only message.

use crate::classify::{self, MESSAGE_ONLY_SENTINEL, MediaCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Content type recorded for message-only submissions.
pub const MESSAGE_ONLY_CONTENT_TYPE: &str = "text/plain";

/// Metadata row for one contribution.
///
/// The stored object is addressed by `file_path`, a public URL that never
/// changes once written. Message-only records carry the sentinel file name
/// and an empty `file_path`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct MediaRecord {
    pub id: Uuid,

    /// Owning event (`EventConfig::id`).
    pub event_id: String,

    /// File name as the guest's device reported it.
    pub file_name: String,

    /// Public retrieval location, empty for message-only records.
    pub file_path: String,

    /// Declared content type.
    pub file_type: String,

    /// Size in bytes.
    pub file_size: i64,

    pub uploaded_by: Option<String>,

    pub message: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl MediaRecord {
    pub fn is_message_only(&self) -> bool {
        self.file_name == MESSAGE_ONLY_SENTINEL
    }

    pub fn category(&self) -> MediaCategory {
        classify::classify_record(self)
    }
}

/// Insert payload for a contribution; id and timestamp are assigned on insert.
#[derive(Clone, Debug)]
pub struct NewMediaRecord {
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_by: Option<String>,
    pub message: Option<String>,
}

impl NewMediaRecord {
    /// A text-only submission with no stored object.
    pub fn message_only(uploaded_by: Option<String>, message: Option<String>) -> Self {
        Self {
            file_name: MESSAGE_ONLY_SENTINEL.to_string(),
            file_path: String::new(),
            file_type: MESSAGE_ONLY_CONTENT_TYPE.to_string(),
            file_size: 0,
            uploaded_by,
            message,
        }
    }
}

/// Dashboard projection of a record.
#[derive(Serialize, Clone, Debug)]
pub struct MediaView {
    #[serde(flatten)]
    pub record: MediaRecord,
    pub category: MediaCategory,
    pub label: &'static str,
    pub size_label: String,
}

impl From<MediaRecord> for MediaView {
    fn from(record: MediaRecord) -> Self {
        let category = record.category();
        Self {
            category,
            label: category.label(),
            size_label: classify::format_file_size(record.file_size),
            record,
        }
    }
}

/// Treat blank form values as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
