use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        claims::Identity,
        dto::{AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, SignupRequest, UserResponse},
        repo_types::PublicUser,
        services::{NewAccount, Session},
    },
    error::AuthError,
    extract::{ApiJson, ClientIp},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/change-password", post(change_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me))
}

fn session_response(
    state: &AppState,
    status: StatusCode,
    session: Session,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    let headers = state.cookies.deliver(&session.tokens)?;
    Ok((
        status,
        headers,
        Json(AuthResponse {
            success: true,
            user: Some(PublicUser::from(&session.user)),
            access_token: Some(session.tokens.access_token),
            error: None,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    let account = NewAccount {
        email: payload.email,
        password: payload.password,
        first_name: payload.first_name,
        last_name: payload.last_name,
        role: payload.role,
    };
    let session = state.sessions.signup(account, &ip).await?;
    session_response(&state, StatusCode::CREATED, session)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    let session = state
        .sessions
        .login(&payload.email, &payload.password, &ip)
        .await?;
    session_response(&state, StatusCode::OK, session)
}

/// Cookie-only. A refresh token sent in a body or header is ignored.
#[instrument(skip(state, headers))]
pub async fn refresh(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    headers: HeaderMap,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), AuthError> {
    let Some(token) = state.cookies.refresh.read(&headers) else {
        warn!("refresh without cookie");
        return Err(AuthError::Unauthorized);
    };
    let session = state.sessions.refresh(&token, &ip).await?;
    session_response(&state, StatusCode::OK, session)
}

#[instrument(skip(state))]
pub async fn logout(
    State(state): State<AppState>,
    identity: Identity,
    ClientIp(ip): ClientIp,
) -> Result<(HeaderMap, Json<MessageResponse>), AuthError> {
    state.sessions.logout(&identity, &ip).await?;
    Ok((
        state.cookies.clear()?,
        Json(MessageResponse {
            success: true,
            message: "logged out".into(),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<UserResponse>, AuthError> {
    let user = state.sessions.whoami(&identity).await?;
    Ok(Json(UserResponse {
        success: true,
        user: PublicUser::from(&user),
    }))
}

/// Every refresh session ends with the old password, so both cookies are cleared.
#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    identity: Identity,
    ClientIp(ip): ClientIp,
    ApiJson(payload): ApiJson<ChangePasswordRequest>,
) -> Result<(HeaderMap, Json<MessageResponse>), AuthError> {
    state
        .sessions
        .change_password(
            &identity,
            &payload.current_password,
            payload.new_password,
            &ip,
        )
        .await?;
    Ok((
        state.cookies.clear()?,
        Json(MessageResponse {
            success: true,
            message: "password changed".into(),
        }),
    ))
}
