//! User management command handlers

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthError, AuthService, SeaOrmAuthService};

fn auth_service(store: Store, config: &Config) -> SeaOrmAuthService {
    SeaOrmAuthService::new(store, config.security.clone(), true)
}

pub async fn cmd_user_add(config: &Config, username: &str, password: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    match auth_service(store, config).create_user(username, password).await {
        Ok(created) => {
            println!("✓ Created user '{}'", created.username);
            println!("  API key: {}", created.api_key);
            Ok(())
        }
        Err(AuthError::UsernameTaken) => {
            println!("User '{username}' already exists.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn cmd_user_delete(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    match auth_service(store, config).delete_user(username).await {
        Ok(projects) => {
            println!("✓ Deleted user '{username}' and {projects} project(s)");
            Ok(())
        }
        Err(AuthError::UserNotFound) => {
            println!("User '{username}' not found.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
