use crate::entities::prelude::*;
use crate::entities::{domains, hosts, ports, projects, scan_runs};
use sea_orm_migration::prelude::*;

/// Unique natural keys backing the conflict-resolving upserts.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .name("idx_hosts_project_ip_unique")
                    .table(Hosts)
                    .col(hosts::Column::Project)
                    .col(hosts::Column::Ip)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ports_host_port_unique")
                    .table(Ports)
                    .col(ports::Column::Host)
                    .col(ports::Column::Port)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_domains_project_domain_unique")
                    .table(Domains)
                    .col(domains::Column::Project)
                    .col(domains::Column::Domain)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_projects_owner")
                    .table(Projects)
                    .col(projects::Column::Owner)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_scan_runs_project_created")
                    .table(ScanRuns)
                    .col(scan_runs::Column::Project)
                    .col(scan_runs::Column::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_scan_runs_project_created")
                    .table(ScanRuns)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_projects_owner")
                    .table(Projects)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_domains_project_domain_unique")
                    .table(Domains)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_ports_host_port_unique")
                    .table(Ports)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_hosts_project_ip_unique")
                    .table(Hosts)
                    .to_owned(),
            )
            .await
    }
}
