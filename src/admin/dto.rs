use serde::{Deserialize, Serialize};

use crate::auth::{audit::AuditLogEntry, repo_types::PublicUser, roles::Role};

/// Body for provisioning an account with a temporary password.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub temporary_password: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUserResponse {
    pub success: bool,
    pub user: PublicUser,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub success: bool,
    pub entries: Vec<AuditLogEntry>,
}
