//! Domain service for authentication and user management.
//!
//! Handles registration, login, password changes, API keys and account
//! removal. Sessions themselves live in the HTTP layer.

use serde::Serialize;
use thiserror::Error;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Registration is disabled")]
    RegistrationDisabled,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// User info DTO for responses.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub username: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Login result containing the username and API key.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub username: String,
    pub api_key: String,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account and returns its API key.
    ///
    /// # Errors
    ///
    /// - [`AuthError::RegistrationDisabled`] when open registration is off
    /// - [`AuthError::UsernameTaken`] if the name exists
    /// - [`AuthError::Validation`] for a bad username or short password
    async fn register(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Creates an account regardless of the registration setting.
    async fn create_user(&self, username: &str, password: &str)
    -> Result<LoginResult, AuthError>;

    /// Verifies credentials.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Verifies an API key and returns the associated username if valid.
    async fn verify_api_key(&self, api_key: &str) -> Result<Option<String>, AuthError>;

    async fn get_user_info(&self, username: &str) -> Result<UserInfo, AuthError>;

    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if the current password is incorrect
    /// or the new one is invalid.
    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Regenerates the API key for a user and returns the new one.
    async fn regenerate_api_key(&self, username: &str) -> Result<String, AuthError>;

    /// Removes the user and every project they own. Returns the number of
    /// projects deleted.
    async fn delete_user(&self, username: &str) -> Result<usize, AuthError>;
}
