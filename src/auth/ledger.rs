use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

/// Source of truth for which refresh sessions are alive.
///
/// Records are keyed by the refresh token hash. Once a record is revoked or
/// past `expires_at` nothing brings it back.
#[async_trait]
pub trait SessionLedger: Send + Sync {
    async fn save(&self, user_id: Uuid, token_hash: &str, expires_at: OffsetDateTime)
        -> anyhow::Result<()>;

    async fn is_live(&self, user_id: Uuid, token_hash: &str) -> anyhow::Result<bool>;

    /// Idempotent.
    async fn revoke(&self, token_hash: &str) -> anyhow::Result<()>;

    /// Idempotent. Returns how many live records were killed; expired ones are
    /// already dead and are neither touched nor counted.
    async fn revoke_all(&self, user_id: Uuid) -> anyhow::Result<u64>;

    /// Kills the live record for `old_hash` and stores `new_hash` in one atomic step.
    ///
    /// Returns `false` without inserting anything when the old record is missing,
    /// already revoked, expired, or owned by another user. Of several concurrent
    /// calls for the same `old_hash`, at most one returns `true`.
    async fn rotate(
        &self,
        user_id: Uuid,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgSessionLedger {
    db: PgPool,
}

impl PgSessionLedger {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionLedger for PgSessionLedger {
    async fn save(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .context("insert refresh token")?;
        Ok(())
    }

    async fn is_live(&self, user_id: Uuid, token_hash: &str) -> anyhow::Result<bool> {
        let live: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM refresh_tokens
                WHERE user_id = $1 AND token_hash = $2
                  AND revoked_at IS NULL AND expires_at > now()
            )
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_one(&self.db)
        .await
        .context("check refresh token")?;
        Ok(live)
    }

    async fn revoke(&self, token_hash: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens SET revoked_at = now()
            WHERE token_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .execute(&self.db)
        .await
        .context("revoke refresh token")?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens SET revoked_at = now()
            WHERE user_id = $1 AND revoked_at IS NULL AND expires_at > now()
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await
        .context("revoke user refresh tokens")?;
        Ok(result.rows_affected())
    }

    async fn rotate(
        &self,
        user_id: Uuid,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        // A concurrent UPDATE on the same row waits for the winner to commit and
        // then re-checks `revoked_at IS NULL`, so the loser claims zero rows and
        // inserts nothing.
        let result = sqlx::query(
            r#"
            WITH claimed AS (
                UPDATE refresh_tokens
                SET revoked_at = now()
                WHERE token_hash = $1 AND user_id = $2
                  AND revoked_at IS NULL AND expires_at > now()
                RETURNING user_id
            )
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            SELECT user_id, $3, $4 FROM claimed
            "#,
        )
        .bind(old_hash)
        .bind(user_id)
        .bind(new_hash)
        .bind(new_expires_at)
        .execute(&self.db)
        .await
        .context("rotate refresh token")?;
        Ok(result.rows_affected() == 1)
    }
}
