//! Dashboard handlers. Every route here requires `AdminAccess`.

use crate::{
    classify::{CategoryCounts, MediaCategory},
    errors::AppError,
    handlers::auth_handlers::AdminAccess,
    models::{event::EventInfo, media::MediaView},
    services::archive_service::{ArchiveBuilder, StorageFetcher},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub category: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct DashboardView {
    pub event: EventInfo,
    pub total: usize,
    /// Always covers the whole event, regardless of the category filter.
    pub counts: CategoryCounts,
    pub media: Vec<MediaView>,
}

/// `GET /api/media`: newest first, optionally filtered to one category.
pub async fn list_media(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardView>, AppError> {
    let filter = query
        .category
        .as_deref()
        .map(str::parse::<MediaCategory>)
        .transpose()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let records = state.media.list_for_event(&state.event.id).await?;
    let counts = CategoryCounts::tally(&records);
    let total = records.len();
    let media = records
        .into_iter()
        .map(MediaView::from)
        .filter(|view| filter.is_none_or(|category| view.category == category))
        .collect();

    Ok(Json(DashboardView {
        event: state.event.info(),
        total,
        counts,
        media,
    }))
}

/// `GET /api/media/{id}`: one record for the preview modal.
pub async fn get_media(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MediaView>, AppError> {
    let record = state.media.get(&state.event.id, id).await?;
    Ok(Json(MediaView::from(record)))
}

/// `DELETE /api/media/{id}`: removes the record; the stored file stays.
pub async fn delete_media(
    _admin: AdminAccess,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let record = state.media.delete(&state.event.id, id).await?;
    info!("deleted media record {} ({})", record.id, record.file_name);
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/media/archive`: everything as one ZIP.
pub async fn download_archive(
    _admin: AdminAccess,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let records = state.media.list_for_event(&state.event.id).await?;
    if records.is_empty() {
        return Err(AppError::not_found("nothing to download"));
    }

    let builder = ArchiveBuilder::new(StorageFetcher::new(state.media.clone()));
    let outcome = builder
        .build(&records, state.event.archive_file_name())
        .await?;
    info!(
        "archive {} ready: {} entries, {} skipped, {} bytes",
        outcome.file_name,
        outcome.entries.len(),
        outcome.skipped.len(),
        outcome.bytes.len()
    );

    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_file_name(&outcome.file_name)
    );
    let mut response = Body::from(outcome.bytes).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zip"),
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert(
        HeaderName::from_static("x-archive-entries"),
        HeaderValue::from(outcome.entries.len()),
    );
    headers.insert(
        HeaderName::from_static("x-archive-skipped"),
        HeaderValue::from(outcome.skipped.len()),
    );
    Ok(response)
}

fn header_safe_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}
