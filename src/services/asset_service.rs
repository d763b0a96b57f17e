//! Domain service for the host/port/domain asset graph.
//!
//! Every analyst-facing call is authorized against the owning project before
//! anything is validated or written.

use crate::api::types::{DomainDto, HostDto};
use crate::domain::{Discovery, Identity, PortObservation, ResourceKind};
use crate::services::access::AccessError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<AccessError> for AssetError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound { kind, id } => Self::NotFound { kind, id },
            AccessError::Database(msg) => Self::Database(msg),
        }
    }
}

impl From<sea_orm::DbErr> for AssetError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AssetError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Outcome of merging one tool discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merged {
    Host,
    Domain,
}

#[async_trait::async_trait]
pub trait AssetService: Send + Sync {
    /// Upserts a host and its ports. Re-sighting resets the style to `New`.
    ///
    /// # Errors
    ///
    /// - [`AssetError::NotFound`] if the project is missing or foreign
    /// - [`AssetError::Validation`] for a bad IP or a port without number/service
    async fn merge_host(
        &self,
        identity: &Identity,
        project_id: &str,
        ip: &str,
        ports: &[PortObservation],
    ) -> Result<HostDto, AssetError>;

    /// Upserts a domain and makes sure its IP exists as a host.
    async fn merge_domain(
        &self,
        identity: &Identity,
        project_id: &str,
        domain: &str,
        ip: &str,
    ) -> Result<DomainDto, AssetError>;

    /// Merges a discovery produced by a background scan.
    ///
    /// The caller must have authorized `project_id` when the scan was queued.
    async fn ingest(&self, project_id: &str, discovery: &Discovery) -> Result<Merged, AssetError>;

    /// Raw note of a host, port or domain.
    async fn get_note(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
    ) -> Result<String, AssetError>;

    /// Stores the trimmed note and returns it rendered.
    async fn update_note(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
        note: &str,
    ) -> Result<String, AssetError>;

    /// Applies an analyst style to a host or domain; returns the applied style.
    async fn set_style(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
        style: &str,
    ) -> Result<String, AssetError>;

    /// Deletes a host together with its ports.
    async fn delete_host(&self, identity: &Identity, id: &str) -> Result<(), AssetError>;

    async fn delete_domain(&self, identity: &Identity, id: &str) -> Result<(), AssetError>;
}
