//! Request extractors whose failures come back in the usual `{success, error}` shape.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AuthError;
use crate::state::AppState;

/// `Json<T>` that rejects with [`AuthError::Validation`].
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// `Query<T>` that rejects with [`AuthError::Validation`].
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// Caller address recorded in the audit trail.
///
/// Forwarding headers are only honored when `TRUST_PROXY_HEADERS` is on;
/// otherwise the socket peer is used, or `unknown` when there is none.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

#[async_trait]
impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        Ok(Self(client_ip(
            &parts.headers,
            peer,
            state.config.trust_proxy_headers,
        )))
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<String>, trust_proxy_headers: bool) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let forwarded = if trust_proxy_headers {
        header("x-forwarded-for").or_else(|| header("x-real-ip"))
    } else {
        None
    };
    forwarded
        .or(peer)
        .unwrap_or_else(|| "unknown".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forged() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        headers
    }

    #[test]
    fn forwarding_headers_ignored_unless_trusted() {
        let peer = Some("192.0.2.4".to_string());
        assert_eq!(client_ip(&forged(), peer, false), "192.0.2.4");
        assert_eq!(client_ip(&forged(), None, false), "unknown");
        assert_eq!(client_ip(&HeaderMap::new(), None, true), "unknown");
    }

    #[test]
    fn trusted_proxy_prefers_forwarded_for() {
        let peer = Some("192.0.2.4".to_string());
        assert_eq!(client_ip(&forged(), peer.clone(), true), "203.0.113.9");

        let mut real_only = HeaderMap::new();
        real_only.insert("x-real-ip", "10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&real_only, peer, true), "10.0.0.2");
    }
}
