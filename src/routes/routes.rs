//! Defines every route the service exposes.
//!
//! ## Structure
//! - **Guest endpoints**
//!   - `GET    /api/event`          -> public event details
//!   - `GET    /api/events/{code}`  -> resolve a guest/admin link code
//!   - `POST   /api/upload`         -> one file or one message per request
//!
//! - **Dashboard endpoints** (`x-admin-password` or `x-admin-code` required)
//!   - `POST   /api/auth/admin`     -> password check
//!   - `GET    /api/media`          -> records, counts, `?category=` filter
//!   - `GET    /api/media/archive`  -> ZIP of everything
//!   - `GET    /api/media/{id}`     -> one record
//!   - `DELETE /api/media/{id}`     -> delete a record (stored file stays)
//!
//! - **Public storage**
//!   - `GET    /files/{*key}`       -> uploaded objects, no credentials

use crate::{
    handlers::{
        auth_handlers::admin_login,
        event_handlers::{get_event, lookup_event},
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        media_handlers::{delete_media, download_archive, get_media, list_media},
        upload_handlers::upload,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the router. `max_upload_bytes` caps the upload request body.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // guest
        .route("/api/event", get(get_event))
        .route("/api/events/{code}", get(lookup_event))
        .route(
            "/api/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        // dashboard
        .route("/api/auth/admin", post(admin_login))
        .route("/api/media", get(list_media))
        .route("/api/media/archive", get(download_archive))
        .route("/api/media/{id}", get(get_media).delete(delete_media))
        // public storage
        .route("/files/{*key}", get(get_file))
        .layer(TraceLayer::new_for_http())
}

/// Router with state attached, ready to serve.
pub fn app(state: AppState) -> Router {
    routes(state.max_upload_bytes).with_state(state)
}
