//! Minimal cookie handling: read one cookie from the request, build one
//! `Set-Cookie` value for the response.

use axum::http::{header, HeaderMap, HeaderValue};
use std::time::Duration;

/// Cookie attributes shared by every cookie the server sets
#[derive(Debug, Clone, Default)]
pub struct CookieConfig {
    /// Add the `Secure` attribute (serve over HTTPS only)
    pub secure: bool,
}

impl CookieConfig {
    /// Load cookie config from environment variables
    /// COOKIE_SECURE=1 marks cookies Secure
    pub fn from_env() -> Self {
        let secure = std::env::var("COOKIE_SECURE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if !secure {
            tracing::info!("Cookies are not marked Secure (set COOKIE_SECURE=1 behind HTTPS)");
        }

        Self { secure }
    }

    /// Build an HttpOnly, SameSite=Strict cookie valid for the whole site
    pub fn build(&self, name: &str, value: &str, max_age: Duration) -> Option<HeaderValue> {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Strict",
            name,
            value,
            max_age.as_secs()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }

        match HeaderValue::from_str(&cookie) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(name, "Refusing to set cookie with invalid characters");
                None
            }
        }
    }
}

/// Find a cookie value across all `Cookie` headers of a request
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim_matches('"'))
}
