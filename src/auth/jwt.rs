use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use sha2::{Digest, Sha256};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::{
    claims::{Claims, TokenKind},
    roles::Role,
};
use crate::config::JwtConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token signature, format or type is invalid")]
    Invalid,
    #[error("token has expired")]
    Expired,
}

/// Freshly minted credentials. `refresh_token` goes to the client once; only
/// `refresh_token_hash` is ever persisted.
#[derive(Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_hash: String,
    pub access_expires_at: OffsetDateTime,
    pub refresh_expires_at: OffsetDateTime,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("refresh_token_hash", &self.refresh_token_hash)
            .field("refresh_expires_at", &self.refresh_expires_at)
            .finish_non_exhaustive()
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

/// Signs and verifies access/refresh JWTs. Stateless and safe to share.
pub struct TokenCodec {
    access: KeyPair,
    refresh: KeyPair,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn new(cfg: &JwtConfig) -> anyhow::Result<Self> {
        if cfg.access_secret.is_empty() || cfg.refresh_secret.is_empty() {
            anyhow::bail!("jwt secrets must not be empty");
        }
        if cfg.access_secret == cfg.refresh_secret {
            anyhow::bail!("access and refresh tokens must be signed with different secrets");
        }
        if cfg.access_ttl_minutes <= 0 || cfg.refresh_ttl_days <= 0 {
            anyhow::bail!("token lifetimes must be positive");
        }
        Ok(Self {
            access: KeyPair::from_secret(&cfg.access_secret),
            refresh: KeyPair::from_secret(&cfg.refresh_secret),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.access_ttl_minutes),
            refresh_ttl: Duration::days(cfg.refresh_ttl_days),
        })
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn create_token_pair(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
    ) -> anyhow::Result<TokenPair> {
        self.create_token_pair_at(user_id, email, role, OffsetDateTime::now_utc())
    }

    pub(crate) fn create_token_pair_at(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        now: OffsetDateTime,
    ) -> anyhow::Result<TokenPair> {
        let (access_token, access_expires_at) =
            self.sign_at(user_id, email, role, TokenKind::Access, now)?;
        let (refresh_token, refresh_expires_at) =
            self.sign_at(user_id, email, role, TokenKind::Refresh, now)?;
        Ok(TokenPair {
            refresh_token_hash: hash_token(&refresh_token),
            access_token,
            refresh_token,
            access_expires_at,
            refresh_expires_at,
        })
    }

    fn sign_at(
        &self,
        user_id: Uuid,
        email: &str,
        role: Role,
        kind: TokenKind,
        now: OffsetDateTime,
    ) -> anyhow::Result<(String, OffsetDateTime)> {
        let (keys, ttl, jti) = match kind {
            TokenKind::Access => (&self.access, self.access_ttl, None),
            TokenKind::Refresh => (&self.refresh, self.refresh_ttl, Some(Uuid::new_v4().to_string())),
        };
        let exp = now + ttl;
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            role,
            kind,
            iat: now.unix_timestamp(),
            exp: exp.unix_timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;
        debug!(user_id = %user_id, kind = ?kind, "jwt signed");
        Ok((token, exp))
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Access)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(token, TokenKind::Refresh)
    }

    fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let keys = match expected {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        };
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));

        let data = decode::<Claims>(token, &keys.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        if data.claims.kind != expected {
            debug!(expected = ?expected, got = ?data.claims.kind, "jwt type mismatch");
            return Err(TokenError::Invalid);
        }
        debug!(user_id = %data.claims.sub, kind = ?expected, "jwt verified");
        Ok(data.claims)
    }
}

/// Deterministic one-way digest used to store and look up refresh tokens.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
