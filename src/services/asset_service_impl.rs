//! `SeaORM` implementation of the `AssetService` trait.

use crate::api::types::{DomainDto, HostDto, PortDto};
use crate::db::Store;
use crate::domain::validator::{is_domain, is_ip, registrable_domain};
use crate::domain::{Discovery, Identity, PortObservation, ResourceKind, Style};
use crate::services::access::AccessGuard;
use crate::services::asset_service::{AssetError, AssetService, Merged};
use crate::services::notes::NoteRenderer;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct SeaOrmAssetService {
    store: Store,
    guard: AccessGuard,
    renderer: Arc<dyn NoteRenderer>,
}

impl SeaOrmAssetService {
    #[must_use]
    pub fn new(store: Store, renderer: Arc<dyn NoteRenderer>) -> Self {
        Self {
            guard: AccessGuard::new(store.clone()),
            store,
            renderer,
        }
    }

    async fn merge_host_unchecked(
        &self,
        project_id: &str,
        ip: &str,
        ports: &[PortObservation],
    ) -> Result<HostDto, AssetError> {
        let ip = ip.trim();
        let ports = normalize_ports(ip, ports)?;

        let host = self.store.merge_host(project_id, ip, &ports).await?;
        let port_rows = self
            .store
            .list_ports_for_hosts(std::slice::from_ref(&host.id))
            .await?;

        Ok(HostDto::with_ports(
            host,
            port_rows.into_iter().map(PortDto::from).collect(),
        ))
    }

    async fn merge_domain_unchecked(
        &self,
        project_id: &str,
        domain: &str,
        ip: &str,
    ) -> Result<DomainDto, AssetError> {
        let domain = domain.trim().to_ascii_lowercase();
        let (domain, ip) = (domain.as_str(), ip.trim());

        if !is_domain(domain) {
            return Err(AssetError::Validation(format!("Invalid domain: '{domain}'")));
        }
        if !is_ip(ip) {
            return Err(AssetError::Validation(format!("Invalid IP address: '{ip}'")));
        }

        let lvl = registrable_domain(domain);
        let model = self.store.merge_domain(project_id, domain, &lvl, ip).await?;

        Ok(DomainDto::from(model))
    }
}

/// Validates a whole port batch before anything is written.
fn normalize_ports(ip: &str, ports: &[PortObservation]) -> Result<Vec<PortObservation>, AssetError> {
    if !is_ip(ip) {
        return Err(AssetError::Validation(format!("Invalid IP address: '{ip}'")));
    }

    ports
        .iter()
        .map(|p| {
            let port = p.port.trim();
            let service = p.service.trim();
            if port.is_empty() || service.is_empty() {
                return Err(AssetError::Validation(
                    "IP, port and service are required".to_string(),
                ));
            }
            if !port.parse::<u16>().is_ok_and(|n| n > 0) {
                return Err(AssetError::Validation(format!("Invalid port: '{port}'")));
            }
            Ok(PortObservation {
                port: port.to_string(),
                service: service.to_string(),
                version: p.version.trim().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl AssetService for SeaOrmAssetService {
    async fn merge_host(
        &self,
        identity: &Identity,
        project_id: &str,
        ip: &str,
        ports: &[PortObservation],
    ) -> Result<HostDto, AssetError> {
        self.guard
            .authorize(ResourceKind::Project, project_id, identity)
            .await?;

        let host = self.merge_host_unchecked(project_id, ip, ports).await?;

        info!(
            event = "host_merged",
            project_id,
            ip = %host.ip,
            portsq = host.portsq,
            "Host merged"
        );

        Ok(host)
    }

    async fn merge_domain(
        &self,
        identity: &Identity,
        project_id: &str,
        domain: &str,
        ip: &str,
    ) -> Result<DomainDto, AssetError> {
        self.guard
            .authorize(ResourceKind::Project, project_id, identity)
            .await?;

        self.merge_domain_unchecked(project_id, domain, ip).await
    }

    async fn ingest(&self, project_id: &str, discovery: &Discovery) -> Result<Merged, AssetError> {
        match discovery {
            Discovery::Host { ip, ports } => {
                self.merge_host_unchecked(project_id, ip, ports).await?;
                Ok(Merged::Host)
            }
            Discovery::Domain { domain, ip } => {
                self.merge_domain_unchecked(project_id, domain, ip).await?;
                Ok(Merged::Domain)
            }
        }
    }

    async fn get_note(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
    ) -> Result<String, AssetError> {
        self.guard.authorize(kind, id, identity).await?;

        let note = match kind {
            ResourceKind::Host => self.store.get_host(id).await?.map(|h| h.note),
            ResourceKind::Port => self.store.get_port(id).await?.map(|p| p.note),
            ResourceKind::Domain => self.store.get_domain(id).await?.map(|d| d.note),
            ResourceKind::Project | ResourceKind::CronTask => None,
        };

        note.ok_or_else(|| AssetError::NotFound {
            kind,
            id: id.to_string(),
        })
    }

    async fn update_note(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
        note: &str,
    ) -> Result<String, AssetError> {
        if !matches!(
            kind,
            ResourceKind::Host | ResourceKind::Port | ResourceKind::Domain
        ) {
            return Err(AssetError::Validation(format!("{kind} has no note")));
        }

        self.guard.authorize(kind, id, identity).await?;

        let note = note.trim();
        self.store.set_note(kind, id, note).await?;

        Ok(self.renderer.render(note))
    }

    async fn set_style(
        &self,
        identity: &Identity,
        kind: ResourceKind,
        id: &str,
        style: &str,
    ) -> Result<String, AssetError> {
        if !matches!(kind, ResourceKind::Host | ResourceKind::Domain) {
            return Err(AssetError::Validation(format!("{kind} has no style")));
        }

        self.guard.authorize(kind, id, identity).await?;

        let style = Style::parse_assignable(style).ok_or_else(|| {
            AssetError::Validation(format!(
                "Style must be one of Checked, Hacked, Suspicious, Default (got '{style}')"
            ))
        })?;

        self.store.set_style(kind, id, style).await?;

        Ok(style.to_string())
    }

    async fn delete_host(&self, identity: &Identity, id: &str) -> Result<(), AssetError> {
        let project = self
            .guard
            .authorize(ResourceKind::Host, id, identity)
            .await?;

        self.store.delete_host(id).await?;
        info!(project_id = %project.id, host_id = id, "Host deleted");
        Ok(())
    }

    async fn delete_domain(&self, identity: &Identity, id: &str) -> Result<(), AssetError> {
        let project = self
            .guard
            .authorize(ResourceKind::Domain, id, identity)
            .await?;

        self.store.delete_domain(id).await?;
        info!(project_id = %project.id, domain_id = id, "Domain deleted");
        Ok(())
    }
}
