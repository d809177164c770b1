use crate::{
    config::AppConfig,
    models::event::EventConfig,
    services::{admin_gate::AdminGate, media_service::MediaService},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub media: MediaService,
    pub event: Arc<EventConfig>,
    pub gate: AdminGate,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, cfg: &AppConfig) -> Self {
        Self {
            media: MediaService::new(db, cfg.storage_dir.clone(), cfg.public_base_url.clone()),
            event: Arc::new(cfg.event.clone()),
            gate: AdminGate::new(cfg.admin_password.clone()),
            max_upload_bytes: cfg.max_upload_bytes,
        }
    }
}
