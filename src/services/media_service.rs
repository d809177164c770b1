//! src/services/media_service.rs
//!
//! MediaService: metadata rows in SQLite and uploaded payloads on local disk,
//! sharded beneath `base_path/{event}/{shard}/{shard}/{file}`. Stored files are
//! public: every object committed here is reachable at
//! `{public_base_url}/files/{key}` without credentials.

use crate::models::media::{MediaRecord, NewMediaRecord};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    Invalid(String),
    #[error("media record `{0}` not found")]
    RecordNotFound(Uuid),
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error("upload stream interrupted: {0}")]
    Stream(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// An upload written to a temporary file, not yet visible under its final key.
#[derive(Debug)]
pub struct StagedUpload {
    tmp_path: PathBuf,
    pub original_name: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
}

/// MediaService provides the storage operations behind the upload endpoint
/// and the dashboard:
/// - Stage + commit an uploaded file, then insert its metadata row
/// - Insert message-only rows
/// - List an event's records newest first, fetch or delete one
/// - Read stored objects back for public serving and archiving
#[derive(Clone)]
pub struct MediaService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where uploaded payloads are stored.
    pub base_path: PathBuf,

    /// Origin prefixed to `/files/{key}` when deriving public locations.
    pub public_base_url: String,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const STAGING_DIR: &str = ".staging";

const SELECT_MEDIA: &str = "SELECT id, event_id, file_name, file_path, file_type, file_size,
                                   uploaded_by, message, created_at
                            FROM media";

impl MediaService {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(key: &str) -> MediaResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(MediaError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(MediaError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(MediaError::InvalidObjectKey);
        }
        if key.split('/').any(|segment| segment.is_empty() || segment.starts_with('.')) {
            return Err(MediaError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Two-level shard identifiers from MD5(key), as lowercase hex (00–ff).
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// `base_path/{first segment}/{shard}/{shard}/{rest}`. Parents may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        match key.split_once('/') {
            Some((prefix, rest)) => {
                path.push(prefix);
                path.push(shard_a);
                path.push(shard_b);
                path.push(rest);
            }
            None => {
                path.push(shard_a);
                path.push(shard_b);
                path.push(key);
            }
        }
        path
    }

    /// Public URL for a storage key.
    pub fn public_location(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_base_url, key)
    }

    /// Storage key for a location this service issued, if it is one of ours.
    pub fn key_for_location<'a>(&self, location: &'a str) -> Option<&'a str> {
        let key = location
            .strip_prefix(self.public_base_url.as_str())?
            .strip_prefix("/files/")?;
        Self::ensure_key_safe(key).ok().map(|_| key)
    }

    /// Fresh random key under the event: `{event}/{unix millis}-{random}.{ext}`.
    pub fn generate_key(event_id: &str, original_name: &str) -> String {
        let ext = original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| {
                !ext.is_empty() && ext.len() <= 16 && ext.bytes().all(|b| b.is_ascii_alphanumeric())
            })
            .unwrap_or_else(|| "bin".to_string());
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}/{}-{}.{}",
            event_id,
            Utc::now().timestamp_millis(),
            &suffix[..12],
            ext
        )
    }

    /// Stream an upload into a temporary file under the storage root.
    ///
    /// - Writes bytes incrementally, counting size while streaming.
    /// - fsyncs before returning.
    /// - Removes the temporary file on any error.
    pub async fn stage_upload<S, E>(
        &self,
        original_name: String,
        content_type: Option<String>,
        stream: S,
    ) -> MediaResult<StagedUpload>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let staging = self.base_path.join(STAGING_DIR);
        fs::create_dir_all(&staging).await?;
        let tmp_path = staging.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    let err: Box<dyn std::error::Error + Send + Sync> = err.into();
                    return Err(MediaError::Stream(err.to_string()));
                }
            };
            size_bytes += chunk.len() as i64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(MediaError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(MediaError::Io(err));
        }

        Ok(StagedUpload {
            tmp_path,
            original_name,
            content_type,
            size_bytes,
        })
    }

    /// Drop a staged upload that will not be committed.
    pub async fn discard_staged(&self, staged: StagedUpload) {
        if let Err(err) = fs::remove_file(&staged.tmp_path).await {
            debug!(
                "failed to remove staged upload {}: {}",
                staged.tmp_path.display(),
                err
            );
        }
    }

    /// Move a staged upload under a fresh random key and insert its record.
    ///
    /// If the insert fails the committed object is removed again, so a failed
    /// request leaves neither a row nor a file behind.
    pub async fn commit_upload(
        &self,
        event_id: &str,
        staged: StagedUpload,
        uploaded_by: Option<String>,
        message: Option<String>,
    ) -> MediaResult<MediaRecord> {
        let key = Self::generate_key(event_id, &staged.original_name);
        let file_path = match self.place_staged(&key, &staged.tmp_path).await {
            Ok(path) => path,
            Err(err) => {
                let _ = fs::remove_file(&staged.tmp_path).await;
                return Err(err);
            }
        };

        let new = NewMediaRecord {
            file_name: staged.original_name,
            file_path: self.public_location(&key),
            file_type: staged
                .content_type
                .unwrap_or_else(|| "application/octet-stream".into()),
            file_size: staged.size_bytes,
            uploaded_by,
            message,
        };

        match self.insert_record(event_id, new).await {
            Ok(record) => Ok(record),
            Err(err) => {
                let _ = fs::remove_file(&file_path).await;
                Err(err)
            }
        }
    }

    /// Rename a staged file to its final sharded path under `key`.
    async fn place_staged(&self, key: &str, tmp_path: &Path) -> MediaResult<PathBuf> {
        Self::ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().ok_or_else(|| {
            MediaError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(parent).await?;
        fs::rename(tmp_path, &file_path).await?;
        Ok(file_path)
    }

    /// Insert a message-only record.
    pub async fn create_message(
        &self,
        event_id: &str,
        uploaded_by: Option<String>,
        message: Option<String>,
    ) -> MediaResult<MediaRecord> {
        if uploaded_by.is_none() && message.is_none() {
            return Err(MediaError::Invalid(
                "Please provide either a name or message".into(),
            ));
        }
        self.insert_record(event_id, NewMediaRecord::message_only(uploaded_by, message))
            .await
    }

    async fn insert_record(&self, event_id: &str, new: NewMediaRecord) -> MediaResult<MediaRecord> {
        let record = sqlx::query_as::<_, MediaRecord>(
            r#"
            INSERT INTO media (
                id, event_id, file_name, file_path, file_type, file_size,
                uploaded_by, message, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id, event_id, file_name, file_path, file_type, file_size,
                      uploaded_by, message, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(&new.file_name)
        .bind(&new.file_path)
        .bind(&new.file_type)
        .bind(new.file_size)
        .bind(&new.uploaded_by)
        .bind(&new.message)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        debug!("inserted media record {} ({})", record.id, record.file_name);
        Ok(record)
    }

    /// All records for an event, newest first.
    pub async fn list_for_event(&self, event_id: &str) -> MediaResult<Vec<MediaRecord>> {
        let rows = sqlx::query_as::<_, MediaRecord>(&format!(
            "{SELECT_MEDIA} WHERE event_id = ? ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(event_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// One record of an event.
    pub async fn get(&self, event_id: &str, id: Uuid) -> MediaResult<MediaRecord> {
        sqlx::query_as::<_, MediaRecord>(&format!("{SELECT_MEDIA} WHERE event_id = ? AND id = ?"))
            .bind(event_id)
            .bind(id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => MediaError::RecordNotFound(id),
                other => MediaError::Sqlx(other),
            })
    }

    /// Delete one metadata row. The stored object is left in place.
    pub async fn delete(&self, event_id: &str, id: Uuid) -> MediaResult<MediaRecord> {
        let record = self.get(event_id, id).await?;

        let result = sqlx::query("DELETE FROM media WHERE id = ? AND event_id = ?")
            .bind(id)
            .bind(event_id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(MediaError::RecordNotFound(id));
        }

        if !record.is_message_only() {
            debug!(
                "deleted record {}; stored object {} retained",
                record.id, record.file_path
            );
        }
        Ok(record)
    }

    /// Open a stored object for streaming out.
    pub async fn open_object(&self, key: &str) -> MediaResult<(File, u64)> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        let file = File::open(&path).await.map_err(|err| not_found_or_io(err, key))?;
        let len = file.metadata().await?.len();
        Ok((file, len))
    }

    /// Read a stored object fully into memory.
    pub async fn read_object(&self, key: &str) -> MediaResult<Vec<u8>> {
        Self::ensure_key_safe(key)?;
        fs::read(self.object_path(key))
            .await
            .map_err(|err| not_found_or_io(err, key))
    }
}

fn not_found_or_io(err: io::Error, key: &str) -> MediaError {
    if err.kind() == ErrorKind::NotFound {
        MediaError::ObjectNotFound(key.to_string())
    } else {
        MediaError::Io(err)
    }
}
