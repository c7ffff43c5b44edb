//! Voter identity: which network address and which browser a ballot comes
//! from.

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap},
};
use ipnet::IpNet;
use rand::RngCore;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;
use crate::types::VoterIdentity;

pub const BROWSER_TOKEN_COOKIE: &str = "browser-token";

/// Browser tokens live for a year
pub const BROWSER_TOKEN_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Address used when nothing identifies the client
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Which peers may set forwarding headers
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// None = forwarding headers are always honoured
    pub trusted_proxies: Option<Vec<IpNet>>,
}

impl IdentityConfig {
    /// Load identity config from environment variables
    /// TRUSTED_PROXIES is a comma-separated list of CIDR ranges
    pub fn from_env() -> Self {
        let Ok(raw) = std::env::var("TRUSTED_PROXIES") else {
            tracing::warn!(
                "TRUSTED_PROXIES not set - X-Forwarded-For is honoured from any peer, \
                 so clients can pick their own rate limit key and voter address"
            );
            return Self::default();
        };

        let trusted_proxies = parse_networks(&raw);
        tracing::info!(
            count = trusted_proxies.len(),
            "Forwarding headers honoured only from trusted proxies"
        );
        Self {
            trusted_proxies: Some(trusted_proxies),
        }
    }

    /// Whether any client may set its own address through forwarding headers
    pub fn forwarding_is_spoofable(&self) -> bool {
        self.trusted_proxies.is_none()
    }

    fn trusts(&self, peer: Option<IpAddr>) -> bool {
        match (&self.trusted_proxies, peer) {
            (None, _) => true,
            (Some(nets), Some(ip)) => nets.iter().any(|n| n.contains(&ip)),
            (Some(_), None) => false,
        }
    }
}

/// Parse CIDR ranges, accepting bare addresses as host routes
fn parse_networks(raw: &str) -> Vec<IpNet> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            let parsed = s
                .parse::<IpNet>()
                .ok()
                .or_else(|| s.parse::<IpAddr>().ok().map(IpNet::from));
            if parsed.is_none() {
                tracing::warn!("Ignoring invalid proxy range '{}'", s);
            }
            parsed
        })
        .collect()
}

/// TCP peer address, when the server was started with connect info
pub fn peer_addr(extensions: &Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Resolve the client's network address.
///
/// First entry of X-Forwarded-For, then X-Real-IP, then the TCP peer.
pub fn client_address(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    config: &IdentityConfig,
) -> String {
    let peer_ip = peer.map(|p| p.ip());

    if config.trusts(peer_ip) {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get(REAL_IP)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer_ip
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

/// Client network address extracted from the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress(pub String);

impl FromRequestParts<Arc<AppState>> for ClientAddress {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientAddress(client_address(
            &parts.headers,
            peer_addr(&parts.extensions),
            &state.identity,
        )))
    }
}

/// Mint a fresh opaque browser token (16 random bytes, hex encoded)
pub fn mint_browser_token() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Tokens we are willing to store and echo back in a cookie
fn is_plausible_token(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= 128
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Combine the address with the browser token, minting a token when the
/// client has none (or sent garbage). Returns whether a token was minted.
pub fn resolve_identity(address: String, token: Option<&str>) -> (VoterIdentity, bool) {
    match token.filter(|t| is_plausible_token(t)) {
        Some(t) => (
            VoterIdentity {
                address,
                browser_token: t.to_string(),
            },
            false,
        ),
        None => (
            VoterIdentity {
                address,
                browser_token: mint_browser_token(),
            },
            true,
        ),
    }
}
