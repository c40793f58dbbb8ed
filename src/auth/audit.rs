use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

pub const UNKNOWN_ACTOR: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Signup,
    Login,
    LoginFailed,
    TokenRefresh,
    TokenReuseDetected,
    Logout,
    PasswordChange,
    UserCreate,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Signup => "signup",
            AuditAction::Login => "login",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::TokenRefresh => "token_refresh",
            AuditAction::TokenReuseDetected => "token_reuse_detected",
            AuditAction::Logout => "logout",
            AuditAction::PasswordChange => "password_change",
            AuditAction::UserCreate => "user_create",
        }
    }
}

/// One security event, as handed to an [`AuditSink`].
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource_type: &'static str,
    pub resource_id: Option<String>,
    pub changes: Value,
    pub ip_address: String,
}

impl AuditEvent {
    pub fn new(action: AuditAction, user_id: Option<Uuid>, ip_address: &str) -> Self {
        Self {
            user_id,
            action,
            resource_type: "session",
            resource_id: user_id.map(|id| id.to_string()),
            changes: Value::Object(Default::default()),
            ip_address: ip_address.to_string(),
        }
    }

    pub fn resource(mut self, resource_type: &'static str, resource_id: impl Into<String>) -> Self {
        self.resource_type = resource_type;
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn changes(mut self, changes: Value) -> Self {
        self.changes = changes;
        self
    }
}

/// Stored audit row.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub user_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub changes: Value,
    pub ip_address: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Append-only storage for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> anyhow::Result<()>;
    /// Newest first.
    async fn recent(&self, limit: i64) -> anyhow::Result<Vec<AuditLogEntry>>;
}

#[derive(Clone)]
pub struct PgAuditSink {
    db: PgPool,
}

impl PgAuditSink {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn append(&self, event: &AuditEvent) -> anyhow::Result<()> {
        let actor = event
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| UNKNOWN_ACTOR.to_string());
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, resource_type, resource_id, changes, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(actor)
        .bind(event.action.as_str())
        .bind(event.resource_type)
        .bind(event.resource_id.as_deref())
        .bind(&event.changes)
        .bind(&event.ip_address)
        .execute(&self.db)
        .await
        .context("insert audit log")?;
        Ok(())
    }

    async fn recent(&self, limit: i64) -> anyhow::Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query_as::<_, AuditLogEntry>(
            r#"
            SELECT id, user_id, action, resource_type, resource_id, changes, ip_address, created_at
            FROM audit_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("list audit logs")?;
        Ok(rows)
    }
}

/// Best-effort writer: failures are logged and never reach the caller.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub async fn record(&self, event: AuditEvent) {
        if let Err(e) = self.sink.append(&event).await {
            warn!(error = %e, action = event.action.as_str(), "audit log write failed");
        }
    }

    pub async fn recent(&self, limit: i64) -> anyhow::Result<Vec<AuditLogEntry>> {
        self.sink.recent(limit).await
    }
}
