use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casefile::{
    abuse, api, auth, cookie, identity, state::AppState, store::StorageConfig, tasks,
};

/// Process-level settings that only the binary cares about
struct ServerConfig {
    bind_addr: SocketAddr,
    cors_permissive: bool,
    hint_sweep_interval: Duration,
}

impl ServerConfig {
    fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|v| match v.parse() {
                Ok(addr) => Some(addr),
                Err(_) => {
                    tracing::warn!("Invalid BIND_ADDR '{}', using default", v);
                    None
                }
            })
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let cors_permissive = std::env::var("CORS_PERMISSIVE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let sweep_secs = std::env::var("HINT_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);

        Self {
            bind_addr,
            cors_permissive,
            hint_sweep_interval: Duration::from_secs(sweep_secs),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "casefile=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting casefile...");

    let storage = StorageConfig::from_env();
    let (cases, votes) = match (
        storage.build_case_store().await,
        storage.build_vote_store().await,
    ) {
        (Ok(cases), Ok(votes)) => (cases, votes),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(
        AppState::new(cases, votes)
            .with_default_case(storage.default_case_id.clone())
            .with_auth(auth::AuthConfig::from_env())
            .with_cookies(cookie::CookieConfig::from_env())
            .with_identity(identity::IdentityConfig::from_env())
            .with_abuse(abuse::AbuseConfig::from_env()),
    );

    if state.abuse.rate_limiter.is_some() && state.identity.forwarding_is_spoofable() {
        tracing::warn!("Login and vote rate limits can be bypassed by rotating X-Forwarded-For");
    }

    if let Err(e) = state.get_case(None).await {
        tracing::warn!(
            "Default case '{}' is not available: {}",
            state.default_case_id,
            e
        );
    }

    let server = ServerConfig::from_env();

    tasks::spawn_hint_reveal_sweeper(state.clone(), server.hint_sweep_interval);
    tasks::spawn_rate_limit_cleanup(state.clone());

    let mut app = api::router(state).layer(TraceLayer::new_for_http());
    if server.cors_permissive {
        tracing::warn!("CORS is permissive");
        app = app.layer(CorsLayer::permissive());
    }

    let listener = match tokio::net::TcpListener::bind(server.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", server.bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://{}", server.bind_addr);

    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
