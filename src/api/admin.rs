//! Admin endpoints: login, case editing and hint control.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::auth::{self, ADMIN_COOKIE, ADMIN_COOKIE_VALUE, ADMIN_SESSION_MAX_AGE};
use crate::error::{AppError, AppResult};
use crate::state::hint::HintAction;
use crate::state::AppState;
use crate::types::{Case, CaseUpdate};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CaseQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HintRequest {
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub hint_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub reveal_at: Option<DateTime<Utc>>,
}

/// GET /api/admin/auth
pub async fn check_auth(headers: HeaderMap) -> Response {
    let authenticated = auth::is_admin(&headers);
    let status = if authenticated {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    (status, Json(json!({ "authenticated": authenticated }))).into_response()
}

/// POST /api/admin/auth
///
/// Sets the admin session cookie when the password matches.
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return AppError::from(rejection).into_response(),
    };
    let password = request.password.unwrap_or_default();
    if !state.auth.validate(&password) {
        tracing::warn!("Failed admin login attempt");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "Invalid password" })),
        )
            .into_response();
    }

    tracing::info!("Admin logged in");
    let mut response = Json(json!({ "success": true })).into_response();
    if let Some(cookie) = state
        .cookies
        .build(ADMIN_COOKIE, ADMIN_COOKIE_VALUE, ADMIN_SESSION_MAX_AGE)
    {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// GET /api/admin/case?id=
pub async fn get_case(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CaseQuery>,
) -> AppResult<Json<Case>> {
    let case = state.get_case(query.id.as_deref()).await?;
    Ok(Json(case))
}

/// POST /api/admin/case
///
/// Fields present in the body overwrite the stored ones; the rest persist.
pub async fn update_case(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CaseUpdate>, JsonRejection>,
) -> AppResult<Json<Case>> {
    let Json(update) = body?;
    let requested = update.id.clone();
    let case = state.update_case(requested.as_deref(), update).await?;
    Ok(Json(case))
}

/// POST /api/admin/hint
pub async fn hint_action(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HintRequest>, JsonRejection>,
) -> AppResult<Json<Case>> {
    let Json(request) = body?;
    let hint_id = request.hint_id.trim();
    if hint_id.is_empty() || request.action.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "Missing hintId or action".to_string(),
        ));
    }

    let action = HintAction::parse(&request.action, request.reveal_at)?;
    let case_id = state.resolve_case_id(request.case_id.as_deref()).await?;
    let case = state.apply_hint_action(&case_id, hint_id, action).await?;
    Ok(Json(case))
}
