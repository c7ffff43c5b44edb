//! Shared-password admin authentication backed by a session-less cookie

use axum::{
    body::Body,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::cookie::get_cookie;
use crate::error::AppError;

pub const ADMIN_COOKIE: &str = "admin-auth";
pub const ADMIN_COOKIE_VALUE: &str = "authenticated";

/// Admin sessions last a day
pub const ADMIN_SESSION_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24);

/// Authentication configuration
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Admin password (None = admin login disabled)
    password: Option<String>,
}

impl AuthConfig {
    /// Load auth config from environment variables
    /// ADMIN_PASSWORD must be set for anyone to log in
    pub fn from_env() -> Self {
        let password = std::env::var("ADMIN_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if password.is_some() {
            tracing::info!("Admin authentication enabled");
        } else {
            tracing::warn!("ADMIN_PASSWORD not set - admin login is DISABLED");
        }

        Self { password }
    }

    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }

    /// Check if a password is configured
    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }

    /// Validate a login attempt
    pub fn validate(&self, candidate: &str) -> bool {
        match &self.password {
            // Compare digests so neither content nor length leaks through timing
            Some(expected) => constant_time_eq(
                &Sha256::digest(expected.as_bytes()),
                &Sha256::digest(candidate.as_bytes()),
            ),
            None => false,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Whether the request carries a valid admin cookie
pub fn is_admin(headers: &HeaderMap) -> bool {
    get_cookie(headers, ADMIN_COOKIE) == Some(ADMIN_COOKIE_VALUE)
}

/// Middleware guarding admin-mutating routes
pub async fn admin_auth_middleware(request: Request<Body>, next: Next) -> Response {
    if is_admin(request.headers()) {
        return next.run(request).await;
    }

    tracing::warn!(
        method = %request.method(),
        uri = %request.uri(),
        "Rejected admin request without valid session cookie"
    );
    AppError::Unauthorized.into_response()
}
