//! Bulk download: every displayed record packed into one ZIP.
//!
//! Assembly is a fold. Each record contributes either an entry or a skip,
//! fetches run concurrently, and serialization waits for every fetch to
//! settle. One unreachable file costs exactly one entry.

use crate::models::media::MediaRecord;
use crate::services::media_service::{MediaError, MediaService};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Datelike, Timelike, Utc};
use futures::{StreamExt, stream};
use std::{
    collections::HashMap,
    io::{self, Cursor, Write},
};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

/// Fetches issued at once while assembling an archive.
const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("record has no storage location")]
    MissingLocation,
    #[error("`{location}` answered with HTTP {status}")]
    Status { location: String, status: u16 },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Storage(#[from] MediaError),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("archive serialization task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Reads the bytes behind a record's storage location.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Bytes, FetchError>;
}

/// Production fetcher. Locations this service issued are read straight from
/// disk; anything else is requested over HTTP.
#[derive(Clone)]
pub struct StorageFetcher {
    media: MediaService,
    http: reqwest::Client,
}

impl StorageFetcher {
    pub fn new(media: MediaService) -> Self {
        Self {
            media,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ObjectFetcher for StorageFetcher {
    async fn fetch(&self, location: &str) -> Result<Bytes, FetchError> {
        if location.is_empty() {
            return Err(FetchError::MissingLocation);
        }

        if let Some(key) = self.media.key_for_location(location) {
            debug!("reading {} from local storage", key);
            return Ok(Bytes::from(self.media.read_object(key).await?));
        }

        let response = self.http.get(location).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                location: location.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}

#[derive(Clone, Debug)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Bytes,
    pub modified: DateTime<Utc>,
}

/// What a single record adds to the archive.
#[derive(Debug)]
pub enum Contribution {
    Entry(ArchiveEntry),
    Skipped(Uuid),
}

/// Fold state. Entry names are unique; a later entry with a taken name
/// replaces the earlier one in place.
#[derive(Debug, Default)]
pub struct ArchiveAccumulator {
    entries: Vec<ArchiveEntry>,
    by_name: HashMap<String, usize>,
    skipped: Vec<Uuid>,
}

impl ArchiveAccumulator {
    pub fn apply(mut self, contribution: Contribution) -> Self {
        match contribution {
            Contribution::Entry(entry) => match self.by_name.get(&entry.name) {
                Some(&slot) => {
                    debug!("archive entry `{}` replaced by a later record", entry.name);
                    self.entries[slot] = entry;
                }
                None => {
                    self.by_name.insert(entry.name.clone(), self.entries.len());
                    self.entries.push(entry);
                }
            },
            Contribution::Skipped(id) => self.skipped.push(id),
        }
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the accumulated entries (Deflate).
    pub fn finish(self, file_name: String) -> Result<ArchiveOutcome, ArchiveError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let mut options =
                SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            if let Some(ts) = zip_timestamp(entry.modified) {
                options = options.last_modified_time(ts);
            }
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.bytes)?;
        }

        let bytes = zip.finish()?.into_inner();
        Ok(ArchiveOutcome {
            file_name,
            bytes,
            entries: self.entries.into_iter().map(|e| e.name).collect(),
            skipped: self.skipped,
        })
    }
}

/// A finished archive plus what went into it.
#[derive(Debug)]
pub struct ArchiveOutcome {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
    pub skipped: Vec<Uuid>,
}

pub struct ArchiveBuilder<F> {
    fetcher: F,
    concurrency: usize,
}

impl<F: ObjectFetcher> ArchiveBuilder<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Build one archive from `records`, named `file_name`.
    pub async fn build(
        &self,
        records: &[MediaRecord],
        file_name: String,
    ) -> Result<ArchiveOutcome, ArchiveError> {
        let pending: Vec<_> = records
            .iter()
            .map(|record| self.contribution(record))
            .collect();
        let contributions: Vec<Contribution> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let accumulator = contributions
            .into_iter()
            .fold(ArchiveAccumulator::default(), ArchiveAccumulator::apply);

        let outcome = tokio::task::spawn_blocking(move || accumulator.finish(file_name)).await??;
        if !outcome.skipped.is_empty() {
            warn!(
                "archive {} built without {} unreachable record(s)",
                outcome.file_name,
                outcome.skipped.len()
            );
        }
        Ok(outcome)
    }

    async fn contribution(&self, record: &MediaRecord) -> Contribution {
        if record.is_message_only() {
            return Contribution::Entry(message_entry(record));
        }

        match self.fetcher.fetch(&record.file_path).await {
            Ok(bytes) => Contribution::Entry(ArchiveEntry {
                name: record.file_name.clone(),
                bytes,
                modified: record.created_at,
            }),
            Err(err) => {
                warn!("skipping {} ({}): {}", record.file_name, record.id, err);
                Contribution::Skipped(record.id)
            }
        }
    }
}

/// Text entry standing in for a message-only record.
pub fn message_entry(record: &MediaRecord) -> ArchiveEntry {
    let mut text = String::new();
    if let Some(name) = &record.uploaded_by {
        text.push_str(&format!("From: {name}\n"));
    }
    if let Some(message) = &record.message {
        text.push_str(&format!("Message: {message}\n"));
    }
    text.push_str(&format!(
        "Date: {} UTC\n",
        record.created_at.format("%-m/%-d/%Y, %-I:%M:%S %p")
    ));

    let guest = record
        .uploaded_by
        .as_deref()
        .map(sanitize_name)
        .unwrap_or_else(|| "Guest".to_string());

    ArchiveEntry {
        name: format!("Message_{}_{}.txt", guest, record.created_at.format("%Y-%m-%d")),
        bytes: Bytes::from(text),
        modified: record.created_at,
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn zip_timestamp(at: DateTime<Utc>) -> Option<zip::DateTime> {
    zip::DateTime::from_date_and_time(
        u16::try_from(at.year()).ok()?,
        at.month() as u8,
        at.day() as u8,
        at.hour() as u8,
        at.minute() as u8,
        at.second() as u8,
    )
    .ok()
}
