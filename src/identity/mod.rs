use std::convert::Infallible;
use std::fmt;
use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::request::Parts,
};

use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN: &str = "unknown";

// ============================================================================
// Client Identity
// ============================================================================

/// Who a request is counted against: the client IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(pub String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve the identity of a request.
///
/// The first `X-Forwarded-For` hop is only used when `trust_proxy` is set;
/// otherwise the socket peer, or `"unknown"` without connect info.
pub fn identify(parts: &Parts, trust_proxy: bool) -> ClientIdentity {
    if trust_proxy {
        let forwarded = parts
            .headers
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|hop| !hop.is_empty());
        if let Some(hop) = forwarded {
            return ClientIdentity(hop.to_string());
        }
    }

    match parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => ClientIdentity(addr.ip().to_string()),
        None => ClientIdentity(UNKNOWN.to_string()),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientIdentity
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        Ok(identify(parts, state.trust_proxy))
    }
}

// ── Unit tests ────────────────────────────────────────────────────────────────
