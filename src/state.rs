use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::auth::{
    audit::{AuditTrail, PgAuditSink},
    cookies::CookieChannels,
    credentials::CredentialStore,
    extractors::AuthGate,
    jwt::TokenCodec,
    ledger::{PgSessionLedger, SessionLedger},
    repo::PgUserStore,
    services::SessionService,
};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: SessionService,
    pub codec: Arc<TokenCodec>,
    pub cookies: Arc<CookieChannels>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<(Self, PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let state = Self::from_parts(
            config,
            CredentialStore::new(Arc::new(PgUserStore::new(db.clone()))),
            Arc::new(PgSessionLedger::new(db.clone())),
            AuditTrail::new(Arc::new(PgAuditSink::new(db.clone()))),
        )?;
        Ok((state, db))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        credentials: CredentialStore,
        ledger: Arc<dyn SessionLedger>,
        audit: AuditTrail,
    ) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(&config.jwt)?);
        let cookies = Arc::new(CookieChannels::new(
            &config.cookies,
            codec.access_ttl(),
            codec.refresh_ttl(),
        ));
        let sessions = SessionService::new(
            credentials,
            codec.clone(),
            ledger,
            audit,
            config.revoke_all_on_reuse,
        );
        Ok(Self {
            config,
            sessions,
            codec,
            cookies,
        })
    }
}

impl FromRef<AppState> for AuthGate {
    fn from_ref(state: &AppState) -> Self {
        AuthGate {
            codec: state.codec.clone(),
            cookies: state.cookies.clone(),
        }
    }
}
