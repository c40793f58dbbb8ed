//! Authorization gate shared by every route that needs to know the caller.
//!
//! Use the middleware (`require_authenticated`, `optional_authenticated`,
//! `require_role`, `require_at_least`) with `from_fn_with_state` on whole
//! routers, or the `Identity` / `MaybeIdentity` extractors in single handlers.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::auth::{claims::Identity, cookies::CookieChannels, jwt::TokenCodec, roles::Role};
use crate::error::AuthError;

#[derive(Clone)]
pub struct AuthGate {
    pub codec: Arc<TokenCodec>,
    pub cookies: Arc<CookieChannels>,
}

impl AuthGate {
    /// Bearer token from `Authorization`, falling back to the readable access cookie.
    pub fn credential(&self, headers: &HeaderMap) -> Option<String> {
        bearer_token(headers).or_else(|| self.cookies.access.read(headers))
    }

    /// `Ok(None)` when the request carries no credential at all.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        let Some(token) = self.credential(headers) else {
            return Ok(None);
        };
        match self.codec.verify_access_token(&token) {
            Ok(claims) => Ok(Some(claims.into())),
            Err(e) => {
                warn!(reason = %e, "access token rejected");
                Err(AuthError::InvalidToken)
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
    AuthGate: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        AuthGate::from_ref(state)
            .authenticate(&parts.headers)?
            .ok_or(AuthError::Unauthorized)
    }
}

/// Caller identity when a valid credential is present, `None` otherwise.
pub struct MaybeIdentity(pub Option<Identity>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeIdentity
where
    S: Send + Sync,
    AuthGate: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(MaybeIdentity(Some(identity.clone())));
        }
        let identity = AuthGate::from_ref(state)
            .authenticate(&parts.headers)
            .ok()
            .flatten();
        Ok(MaybeIdentity(identity))
    }
}

/// Rejects with 401 unless a valid access token is presented; attaches `Identity`.
pub async fn require_authenticated(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = gate
        .authenticate(req.headers())?
        .ok_or(AuthError::Unauthorized)?;
    debug!(user_id = %identity.user_id, role = %identity.role, "request authenticated");
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Attaches `Identity` when a valid credential is present and lets everything else through.
pub async fn optional_authenticated(
    State(gate): State<AuthGate>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Ok(Some(identity)) = gate.authenticate(req.headers()) {
        req.extensions_mut().insert(identity);
    }
    next.run(req).await
}

/// Role allow-list for [`require_role`].
#[derive(Debug, Clone, Copy)]
pub struct AllowedRoles(pub &'static [Role]);

/// Must sit inside `require_authenticated`. 403 unless the caller's role is listed.
pub async fn require_role(
    State(AllowedRoles(allowed)): State<AllowedRoles>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or(AuthError::Unauthorized)?;
    if !allowed.contains(&identity.role) {
        warn!(user_id = %identity.user_id, role = %identity.role, "role not allowed");
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}

/// Must sit inside `require_authenticated`. 403 unless the caller's role includes `min`.
pub async fn require_at_least(
    State(min): State<Role>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .ok_or(AuthError::Unauthorized)?;
    if !identity.role.includes(min) {
        warn!(user_id = %identity.user_id, role = %identity.role, required = %min, "role too low");
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(req).await)
}
