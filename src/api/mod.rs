//! HTTP API endpoints.
//!
//! Admin routes sit behind the session cookie check; login and vote
//! submission are rate limited per client address.

pub mod admin;
pub mod public;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::abuse;
use crate::auth;
use crate::state::AppState;

/// Build the full API router
pub fn router(state: Arc<AppState>) -> Router {
    let admin_routes = Router::new()
        .route(
            "/api/admin/case",
            get(admin::get_case).post(admin::update_case),
        )
        .route("/api/admin/hint", post(admin::hint_action))
        .route_layer(middleware::from_fn(auth::admin_auth_middleware));

    let limited_routes = Router::new()
        .route(
            "/api/admin/auth",
            get(admin::check_auth).post(admin::login),
        )
        .route("/api/vote", post(public::submit_vote))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            abuse::rate_limit_middleware,
        ));

    Router::new()
        .merge(admin_routes)
        .merge(limited_routes)
        .route("/api/case", get(public::get_case))
        .route("/api/vote/results", get(public::vote_results))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
