//! Event lookups for guest and dashboard links.

use crate::{
    errors::AppError,
    models::event::{EventInfo, EventRole},
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct EventLookup {
    #[serde(flatten)]
    pub event: EventInfo,
    pub role: EventRole,
}

/// `GET /api/event`
pub async fn get_event(State(state): State<AppState>) -> Json<EventInfo> {
    Json(state.event.info())
}

/// `GET /api/events/{code}`: resolve a guest or admin link code.
pub async fn lookup_event(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<EventLookup>, AppError> {
    let role = state
        .event
        .role_for_code(&code)
        .ok_or_else(|| AppError::not_found("Event not found. Please check your link."))?;
    Ok(Json(EventLookup {
        event: state.event.info(),
        role,
    }))
}
