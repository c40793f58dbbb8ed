use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::auth::{
    audit::{AuditAction, AuditEvent, AuditTrail},
    claims::Identity,
    credentials::CredentialStore,
    jwt::{hash_token, TokenCodec, TokenPair},
    ledger::SessionLedger,
    password::MIN_PASSWORD_LEN,
    repo_types::User,
    roles::Role,
};
use crate::error::AuthError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// A user together with the tokens just minted for them.
#[derive(Debug)]
pub struct Session {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Option<Role>,
}

impl NewAccount {
    /// Trims fields and checks shape. Returns the role to create with.
    fn validate(&mut self, default_role: Role) -> Result<Role, AuthError> {
        self.email = self.email.trim().to_string();
        self.first_name = self.first_name.trim().to_string();
        self.last_name = self.last_name.trim().to_string();

        if self.email.is_empty() || self.first_name.is_empty() || self.last_name.is_empty() {
            return Err(AuthError::Validation(
                "email, firstName and lastName are required".into(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(AuthError::Validation("invalid email".into()));
        }
        check_password_len(&self.password)?;
        Ok(self.role.unwrap_or(default_role))
    }
}

fn check_password_len(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Login / signup / refresh / logout / whoami over the credential store,
/// token codec and session ledger.
#[derive(Clone)]
pub struct SessionService {
    credentials: CredentialStore,
    codec: Arc<TokenCodec>,
    ledger: Arc<dyn SessionLedger>,
    audit: AuditTrail,
    revoke_all_on_reuse: bool,
}

impl SessionService {
    pub fn new(
        credentials: CredentialStore,
        codec: Arc<TokenCodec>,
        ledger: Arc<dyn SessionLedger>,
        audit: AuditTrail,
        revoke_all_on_reuse: bool,
    ) -> Self {
        Self {
            credentials,
            codec,
            ledger,
            audit,
            revoke_all_on_reuse,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    async fn issue(&self, user: &User) -> Result<TokenPair, AuthError> {
        let tokens = self.codec.create_token_pair(user.id, &user.email, user.role)?;
        self.ledger
            .save(user.id, &tokens.refresh_token_hash, tokens.refresh_expires_at)
            .await?;
        Ok(tokens)
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str, ip: &str) -> Result<Session, AuthError> {
        let email = email.trim();
        let Some(user) = self.credentials.verify_password(email, password).await? else {
            warn!("login rejected");
            self.audit
                .record(
                    AuditEvent::new(AuditAction::LoginFailed, None, ip)
                        .changes(json!({ "email": email })),
                )
                .await;
            return Err(AuthError::InvalidCredentials);
        };

        let tokens = self.issue(&user).await?;
        self.audit
            .record(AuditEvent::new(AuditAction::Login, Some(user.id), ip))
            .await;
        info!(user_id = %user.id, "user logged in");
        Ok(Session { user, tokens })
    }

    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn signup(&self, mut account: NewAccount, ip: &str) -> Result<Session, AuthError> {
        let role = account.validate(Role::Student)?;
        if !role.is_self_assignable() {
            warn!(role = %role, "signup asked for a privileged role");
            return Err(AuthError::Forbidden);
        }

        let user = self
            .credentials
            .create(
                &account.email,
                account.password,
                &account.first_name,
                &account.last_name,
                role,
            )
            .await?;

        let tokens = self.issue(&user).await?;
        self.audit
            .record(
                AuditEvent::new(AuditAction::Signup, Some(user.id), ip)
                    .resource("user", user.id.to_string())
                    .changes(json!({ "role": role })),
            )
            .await;
        info!(user_id = %user.id, "user signed up");
        Ok(Session { user, tokens })
    }

    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str, ip: &str) -> Result<Session, AuthError> {
        let claims = self.codec.verify_refresh_token(refresh_token).map_err(|e| {
            warn!(reason = %e, "refresh token rejected");
            AuthError::InvalidToken
        })?;
        let old_hash = hash_token(refresh_token);

        let Some(user) = self.credentials.find_by_id(claims.sub).await? else {
            warn!(user_id = %claims.sub, "refresh for a user that no longer exists");
            self.ledger.revoke(&old_hash).await?;
            return Err(AuthError::NotFound);
        };

        // The new pair is only handed out if the rotation below claims the old record.
        let tokens = self.codec.create_token_pair(user.id, &user.email, user.role)?;
        let rotated = self
            .ledger
            .rotate(
                user.id,
                &old_hash,
                &tokens.refresh_token_hash,
                tokens.refresh_expires_at,
            )
            .await?;

        if !rotated {
            let revoked = if self.revoke_all_on_reuse {
                self.ledger.revoke_all(user.id).await?
            } else {
                0
            };
            warn!(user_id = %user.id, revoked, "refresh token reuse detected");
            self.audit
                .record(
                    AuditEvent::new(AuditAction::TokenReuseDetected, Some(user.id), ip)
                        .changes(json!({ "revokedSessions": revoked })),
                )
                .await;
            return Err(AuthError::TokenReuseDetected);
        }

        self.audit
            .record(AuditEvent::new(AuditAction::TokenRefresh, Some(user.id), ip))
            .await;
        info!(user_id = %user.id, "session rotated");
        Ok(Session { user, tokens })
    }

    /// Ends every session the user has, on every device.
    #[instrument(skip(self))]
    pub async fn logout(&self, identity: &Identity, ip: &str) -> Result<u64, AuthError> {
        let revoked = self.ledger.revoke_all(identity.user_id).await?;
        self.audit
            .record(
                AuditEvent::new(AuditAction::Logout, Some(identity.user_id), ip)
                    .changes(json!({ "revokedSessions": revoked })),
            )
            .await;
        info!(user_id = %identity.user_id, revoked, "user logged out");
        Ok(revoked)
    }

    /// Current profile from the store, not from the (possibly stale) token claims.
    pub async fn whoami(&self, identity: &Identity) -> Result<User, AuthError> {
        self.credentials
            .find_by_id(identity.user_id)
            .await?
            .ok_or(AuthError::NotFound)
    }

    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        identity: &Identity,
        current_password: &str,
        new_password: String,
        ip: &str,
    ) -> Result<(), AuthError> {
        let user = self.whoami(identity).await?;
        if self
            .credentials
            .verify_password(&user.email, current_password)
            .await?
            .is_none()
        {
            return Err(AuthError::InvalidCredentials);
        }
        check_password_len(&new_password)?;

        self.credentials.change_password(user.id, new_password).await?;
        let revoked = self.ledger.revoke_all(user.id).await?;
        self.audit
            .record(
                AuditEvent::new(AuditAction::PasswordChange, Some(user.id), ip)
                    .resource("user", user.id.to_string())
                    .changes(json!({ "revokedSessions": revoked })),
            )
            .await;
        Ok(())
    }

    /// Admin-side account creation with a temporary password.
    #[instrument(skip(self, account), fields(email = %account.email))]
    pub async fn provision_user(
        &self,
        actor: &Identity,
        mut account: NewAccount,
        ip: &str,
    ) -> Result<User, AuthError> {
        let role = account.validate(Role::Student)?;
        if !actor.role.can_assign(role) {
            warn!(actor = %actor.user_id, role = %role, "role assignment refused");
            return Err(AuthError::Forbidden);
        }

        let user = self
            .credentials
            .create_provisioned(
                &account.email,
                account.password,
                &account.first_name,
                &account.last_name,
                role,
            )
            .await?;
        self.audit
            .record(
                AuditEvent::new(AuditAction::UserCreate, Some(actor.user_id), ip)
                    .resource("user", user.id.to_string())
                    .changes(json!({ "role": role, "mustChangePassword": true })),
            )
            .await;
        Ok(user)
    }
}
