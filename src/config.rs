pub const DEFAULT_ACCESS_TTL_MINUTES: i64 = 5;
pub const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    /// Adds `Secure` to both cookies; turn on whenever the frontend is served over HTTPS.
    pub secure: bool,
    /// Path the refresh cookie is scoped to. Must cover the refresh and logout routes.
    pub refresh_path: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub cookies: CookieConfig,
    /// On a refresh with an already-spent token, also end every other session
    /// of that user. Two tabs racing on one cookie trip this too, and the
    /// winner's freshly minted session dies with the rest; that client has to
    /// log in again.
    pub revoke_all_on_reuse: bool,
    /// Take the audit IP from `X-Forwarded-For` / `X-Real-IP`. Only turn on
    /// behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            access_secret: std::env::var("JWT_ACCESS_SECRET")?,
            refresh_secret: std::env::var("JWT_REFRESH_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "sessiond".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "sessiond-clients".into()),
            access_ttl_minutes: env_parse("ACCESS_TOKEN_TTL_MINUTES")
                .unwrap_or(DEFAULT_ACCESS_TTL_MINUTES),
            refresh_ttl_days: env_parse("REFRESH_TOKEN_TTL_DAYS")
                .unwrap_or(DEFAULT_REFRESH_TTL_DAYS),
        };
        let cookies = CookieConfig {
            secure: env_parse("COOKIE_SECURE").unwrap_or(false),
            refresh_path: std::env::var("REFRESH_COOKIE_PATH")
                .unwrap_or_else(|_| "/api/v1/auth".into()),
        };
        Ok(Self {
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            cookies,
            revoke_all_on_reuse: env_parse("REFRESH_REUSE_REVOKES_ALL").unwrap_or(true),
            trust_proxy_headers: env_parse("TRUST_PROXY_HEADERS").unwrap_or(false),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
