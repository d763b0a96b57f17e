//! Ownership checks for every project-scoped resource.

use crate::db::Store;
use crate::domain::{Identity, ResourceKind};
use crate::entities::projects;
use thiserror::Error;
use tracing::debug;

/// A missing resource and a resource owned by someone else are
/// deliberately the same error.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for AccessError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

#[derive(Clone)]
pub struct AccessGuard {
    store: Store,
}

impl AccessGuard {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    /// Resolves `id` to its owning project and checks the owner is `identity`.
    pub async fn authorize(
        &self,
        kind: ResourceKind,
        id: &str,
        identity: &Identity,
    ) -> Result<projects::Model, AccessError> {
        let not_found = || AccessError::NotFound {
            kind,
            id: id.to_string(),
        };

        if id.trim().is_empty() {
            return Err(not_found());
        }

        match self.store.owning_project(kind, id).await? {
            Some(project) if project.owner == identity.username() => Ok(project),
            Some(project) => {
                debug!(
                    %kind,
                    id,
                    project_id = %project.id,
                    user = %identity,
                    "Access denied to foreign resource"
                );
                Err(not_found())
            }
            None => Err(not_found()),
        }
    }
}
