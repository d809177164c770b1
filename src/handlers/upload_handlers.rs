//! `POST /api/upload`: the guest write path.
//!
//! Fields: `file` (optional), `guestName`, `message`, `messageOnly`. A file
//! part is streamed to a staging file as it arrives and only becomes visible
//! once its metadata row is in.

use crate::{
    errors::AppError,
    models::media::non_blank,
    services::media_service::{MediaError, MediaService, StagedUpload},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartError},
};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub message_only: bool,
    pub id: Uuid,
}

#[derive(Default)]
struct UploadFields {
    guest_name: Option<String>,
    message: Option<String>,
    message_only: bool,
    file: Option<StagedUpload>,
}

pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut fields = collect_fields(&state.media, multipart).await?;
    let guest_name = non_blank(fields.guest_name.take());
    let message = non_blank(fields.message.take());

    if fields.message_only {
        if let Some(staged) = fields.file.take() {
            state.media.discard_staged(staged).await;
        }

        let record = state
            .media
            .create_message(&state.event.id, guest_name, message)
            .await
            .map_err(|err| match err {
                MediaError::Invalid(reason) => AppError::bad_request(reason),
                other => {
                    error!("failed to save message: {}", other);
                    AppError::internal("Failed to save message")
                }
            })?;

        info!("message-only submission {} saved", record.id);
        return Ok(Json(UploadResponse {
            success: true,
            message_only: true,
            id: record.id,
        }));
    }

    let Some(staged) = fields.file.take() else {
        return Err(AppError::bad_request("File is required"));
    };
    if staged.original_name.trim().is_empty() {
        state.media.discard_staged(staged).await;
        return Err(AppError::bad_request("Invalid file - missing file name"));
    }

    let record = state
        .media
        .commit_upload(&state.event.id, staged, guest_name, message)
        .await
        .map_err(|err| match err {
            MediaError::Sqlx(err) => {
                error!("failed to save file record: {}", err);
                AppError::internal("Failed to save file record")
            }
            other => {
                error!("failed to store upload: {}", other);
                AppError::internal("Failed to upload file")
            }
        })?;

    info!(
        "stored {} ({} bytes) as {}",
        record.file_name, record.file_size, record.file_path
    );
    Ok(Json(UploadResponse {
        success: true,
        message_only: false,
        id: record.id,
    }))
}

/// Read every part. Anything already staged is discarded if a later part fails.
async fn collect_fields(
    media: &MediaService,
    multipart: Multipart,
) -> Result<UploadFields, AppError> {
    let mut fields = UploadFields::default();
    if let Err(err) = read_fields(media, multipart, &mut fields).await {
        if let Some(staged) = fields.file.take() {
            media.discard_staged(staged).await;
        }
        return Err(err);
    }
    Ok(fields)
}

async fn read_fields(
    media: &MediaService,
    mut multipart: Multipart,
    fields: &mut UploadFields,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let original_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let staged = media
                    .stage_upload(original_name, content_type, field)
                    .await
                    .map_err(|err| match err {
                        MediaError::Stream(_) => AppError::from(err),
                        other => {
                            error!("failed to stage upload: {}", other);
                            AppError::internal("Failed to upload file")
                        }
                    })?;
                if let Some(previous) = fields.file.replace(staged) {
                    media.discard_staged(previous).await;
                }
            }
            Some("guestName") => {
                fields.guest_name = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("message") => {
                fields.message = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("messageOnly") => {
                fields.message_only = field.text().await.map_err(multipart_error)? == "true";
            }
            other => debug!("ignoring multipart field {:?}", other),
        }
    }
    Ok(())
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}
