use std::sync::Arc;

use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::auth::{
    password::{hash_password_blocking, verify_against_dummy, verify_password},
    repo::{UserStore, UserStoreError},
    repo_types::{NewUser, User},
    roles::Role,
};
use crate::error::AuthError;

/// User lookup, creation and password checks on top of a [`UserStore`].
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserStore>,
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.users.find_by_email(email).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.users.find_by_id(id).await
    }

    /// Self-service account creation.
    pub async fn create(
        &self,
        email: &str,
        raw_password: String,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        self.insert(email, raw_password, first_name, last_name, role, false)
            .await
    }

    /// Admin-provisioned account; the holder must pick a new password on first use.
    pub async fn create_provisioned(
        &self,
        email: &str,
        raw_password: String,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<User, AuthError> {
        self.insert(email, raw_password, first_name, last_name, role, true)
            .await
    }

    #[instrument(skip(self, raw_password))]
    async fn insert(
        &self,
        email: &str,
        raw_password: String,
        first_name: &str,
        last_name: &str,
        role: Role,
        must_change_password: bool,
    ) -> Result<User, AuthError> {
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::AlreadyExists);
        }
        let password_hash = hash_password_blocking(raw_password).await?;
        let user = self
            .users
            .insert(NewUser {
                email: email.to_string(),
                password_hash,
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role,
                must_change_password,
            })
            .await
            .map_err(|e| match e {
                UserStoreError::EmailTaken => AuthError::AlreadyExists,
                UserStoreError::Other(e) => AuthError::Internal(e),
            })?;
        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    /// Returns the user only when the password matches. Unknown email and wrong
    /// password are indistinguishable to the caller.
    pub async fn verify_password(
        &self,
        email: &str,
        raw_password: &str,
    ) -> anyhow::Result<Option<User>> {
        let user = self.users.find_by_email(email).await?;
        let raw = raw_password.to_string();
        let matched = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<User>> {
            match user {
                Some(user) => {
                    let ok = verify_password(&raw, &user.password_hash)?;
                    Ok(ok.then_some(user))
                }
                None => {
                    verify_against_dummy(&raw);
                    Ok(None)
                }
            }
        })
        .await??;
        debug!(matched = matched.is_some(), "password verification finished");
        Ok(matched)
    }

    pub async fn change_password(
        &self,
        user_id: Uuid,
        new_raw_password: String,
    ) -> Result<(), AuthError> {
        let hash = hash_password_blocking(new_raw_password).await?;
        if !self.users.update_password(user_id, &hash).await? {
            return Err(AuthError::NotFound);
        }
        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}
