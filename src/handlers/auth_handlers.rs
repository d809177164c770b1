//! Admin password check.
//!
//! - POST /api/auth/admin -> `{"success": bool}`; 401 on mismatch, 400 on a malformed body
//! - `AdminAccess` guards dashboard routes. It accepts either the password in
//!   `x-admin-password` or the dashboard link code in `x-admin-code`

use crate::{errors::AppError, models::event::EventRole, state::AppState};
use axum::{
    Json,
    extract::{FromRequestParts, State, rejection::JsonRejection},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";
pub const ADMIN_CODE_HEADER: &str = "x-admin-code";

#[derive(Deserialize)]
pub struct AdminLogin {
    pub password: String,
}

#[derive(Serialize)]
struct AuthResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

pub async fn admin_login(
    State(state): State<AppState>,
    payload: Result<Json<AdminLogin>, JsonRejection>,
) -> Response {
    let Ok(Json(login)) = payload else {
        return auth_response(StatusCode::BAD_REQUEST, Some("Invalid request"));
    };

    if state.gate.verify(&login.password) {
        info!("admin dashboard unlocked");
        auth_response(StatusCode::OK, None)
    } else {
        warn!("rejected admin password attempt");
        auth_response(StatusCode::UNAUTHORIZED, Some("Incorrect password"))
    }
}

fn auth_response(status: StatusCode, error: Option<&'static str>) -> Response {
    let body = AuthResponse {
        success: error.is_none(),
        error,
    };
    (status, Json(body)).into_response()
}

/// Proof that the request carried the admin password or the dashboard link code.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        };

        let password_ok = state.gate.verify(&header(ADMIN_PASSWORD_HEADER));
        let code_ok =
            state.event.role_for_code(&header(ADMIN_CODE_HEADER)) == Some(EventRole::Admin);
        if password_ok || code_ok {
            Ok(AdminAccess)
        } else {
            Err(AppError::unauthorized("Incorrect password"))
        }
    }
}
