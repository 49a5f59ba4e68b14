use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::net::SocketAddr;

pub const UNKNOWN_VISITOR: &str = "unknown";

/// Opaque visitor key used to deduplicate page views. Derived from request
/// origin headers and not verified in any way.
pub struct VisitorIdentity(pub String);

impl<S> FromRequestParts<S> for VisitorIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        Ok(VisitorIdentity(identify(&parts.headers, peer)))
    }
}

/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
pub fn identify(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = real_ip {
        return ip.to_string();
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => UNKNOWN_VISITOR.to_string(),
    }
}
