use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AuditLogResponse, AuditQuery, CreateUserRequest, CreatedUserResponse};
use crate::{
    auth::{claims::Identity, repo_types::PublicUser, services::NewAccount},
    error::AuthError,
    extract::{ApiJson, ApiQuery, ClientIp},
    state::AppState,
};

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 200;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/users", post(create_user))
        .route("/admin/audit-logs", get(list_audit_logs))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    Extension(actor): Extension<Identity>,
    ClientIp(ip): ClientIp,
    ApiJson(body): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), AuthError> {
    let account = NewAccount {
        email: body.email,
        password: body.temporary_password,
        first_name: body.first_name,
        last_name: body.last_name,
        role: body.role,
    };
    let user = state
        .sessions
        .provision_user(&actor, account, &ip)
        .await?;
    info!(user_id = %user.id, role = %user.role, "user provisioned");
    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            success: true,
            user: PublicUser::from(&user),
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_audit_logs(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<AuditQuery>,
) -> Result<Json<AuditLogResponse>, AuthError> {
    let limit = q.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
    let entries = state.sessions.audit().recent(limit).await?;
    Ok(Json(AuditLogResponse {
        success: true,
        entries,
    }))
}
