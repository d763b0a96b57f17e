//! `SeaORM` implementation of the `AuthService` trait.

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::services::auth_service::{AuthError, AuthService, LoginResult, UserInfo};
use async_trait::async_trait;
use tracing::info;

const MAX_USERNAME_LEN: usize = 64;

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    allow_registration: bool,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig, allow_registration: bool) -> Self {
        Self {
            store,
            security,
            allow_registration,
        }
    }

    fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.security.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.security.min_password_length
            )));
        }
        Ok(())
    }
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(AuthError::Validation(format!(
            "Username must be 1 to {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AuthError::Validation(
            "Username may only contain letters, digits, '-', '_' and '.'".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        if !self.allow_registration {
            return Err(AuthError::RegistrationDisabled);
        }
        self.create_user(username, password).await
    }

    async fn create_user(
        &self,
        username: &str,
        password: &str,
    ) -> Result<LoginResult, AuthError> {
        let username = username.trim();
        validate_username(username)?;
        self.validate_password(password)?;

        let user = self
            .store
            .user_repo()
            .create(username, password, &self.security)
            .await?
            .ok_or(AuthError::UsernameTaken)?;

        info!(event = "user_created", username = %user.username, "User created");

        Ok(LoginResult {
            username: user.username,
            api_key: user.api_key,
        })
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let is_valid = self.store.verify_user_password(username, password).await?;

        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(LoginResult {
            username: user.username,
            api_key: user.api_key,
        })
    }

    async fn verify_api_key(&self, api_key: &str) -> Result<Option<String>, AuthError> {
        let user = self.store.verify_api_key(api_key).await?;
        Ok(user.map(|u| u.username))
    }

    async fn get_user_info(&self, username: &str) -> Result<UserInfo, AuthError> {
        let user = self
            .store
            .get_user_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        Ok(UserInfo {
            username: user.username,
            created_at: user.created_at,
            updated_at: user.updated_at,
        })
    }

    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.validate_password(new_password)?;

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        let is_valid = self
            .store
            .verify_user_password(username, current_password)
            .await?;

        if !is_valid {
            return Err(AuthError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }

        self.store
            .user_repo()
            .update_password(username, new_password, &self.security)
            .await?;

        Ok(())
    }

    async fn regenerate_api_key(&self, username: &str) -> Result<String, AuthError> {
        Ok(self.store.user_repo().regenerate_api_key(username).await?)
    }

    async fn delete_user(&self, username: &str) -> Result<usize, AuthError> {
        let removed = self
            .store
            .user_repo()
            .delete(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        info!(event = "user_deleted", username, projects = removed, "User deleted");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("red.team_01").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username(&"a".repeat(MAX_USERNAME_LEN + 1)).is_err());
    }
}
