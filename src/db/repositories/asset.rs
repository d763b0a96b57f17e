use crate::domain::{PortObservation, ScanStrategy, Style};
use crate::entities::{domains, hosts, ports, prelude::*};
use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

pub const PORT_STATE_OPEN: &str = "open";

pub struct AssetRepository {
    conn: DatabaseConnection,
}

impl AssetRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Upserts a host and its port batch, then recounts `portsq`, atomically.
    pub async fn merge_host(
        &self,
        project_id: &str,
        ip: &str,
        observations: &[PortObservation],
    ) -> Result<hosts::Model> {
        let txn = self.conn.begin().await?;

        let host = upsert_host(&txn, project_id, ip).await?;
        upsert_ports(&txn, &host.id, observations).await?;
        let portsq = recount_ports(&txn, &host.id).await?;

        txn.commit().await?;

        Ok(hosts::Model { portsq, ..host })
    }

    /// Upserts a domain, making sure its resolved IP exists as a host.
    pub async fn merge_domain(
        &self,
        project_id: &str,
        domain: &str,
        lvl: &str,
        ip: &str,
    ) -> Result<domains::Model> {
        let txn = self.conn.begin().await?;

        ensure_host(&txn, project_id, ip).await?;

        Domains::insert(domains::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            project: Set(project_id.to_string()),
            domain: Set(domain.to_string()),
            lvl: Set(lvl.to_string()),
            ip: Set(ip.to_string()),
            note: Set(String::new()),
            style: Set(Style::New.to_string()),
        })
        .on_conflict(
            OnConflict::columns([domains::Column::Project, domains::Column::Domain])
                .update_column(domains::Column::Ip)
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        let model = Domains::find()
            .filter(domains::Column::Project.eq(project_id))
            .filter(domains::Column::Domain.eq(domain))
            .one(&txn)
            .await?
            .context("Domain row missing after upsert")?;

        txn.commit().await?;

        Ok(model)
    }

    pub async fn get_host(&self, id: &str) -> Result<Option<hosts::Model>> {
        Ok(Hosts::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_port(&self, id: &str) -> Result<Option<ports::Model>> {
        Ok(Ports::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn get_domain(&self, id: &str) -> Result<Option<domains::Model>> {
        Ok(Domains::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn list_hosts(&self, project_id: &str) -> Result<Vec<hosts::Model>> {
        Ok(Hosts::find()
            .filter(hosts::Column::Project.eq(project_id))
            .order_by_asc(hosts::Column::Ip)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_ports_for_hosts(&self, host_ids: &[String]) -> Result<Vec<ports::Model>> {
        if host_ids.is_empty() {
            return Ok(Vec::new());
        }

        Ok(Ports::find()
            .filter(ports::Column::Host.is_in(host_ids.iter().cloned()))
            .order_by_asc(ports::Column::Host)
            .order_by_asc(ports::Column::Port)
            .all(&self.conn)
            .await?)
    }

    pub async fn list_domains(&self, project_id: &str) -> Result<Vec<domains::Model>> {
        Ok(Domains::find()
            .filter(domains::Column::Project.eq(project_id))
            .order_by_asc(domains::Column::Domain)
            .all(&self.conn)
            .await?)
    }

    pub async fn set_host_note(&self, id: &str, note: &str) -> Result<bool> {
        let result = Hosts::update_many()
            .col_expr(hosts::Column::Note, Expr::value(note))
            .filter(hosts::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn set_port_note(&self, id: &str, note: &str) -> Result<bool> {
        let result = Ports::update_many()
            .col_expr(ports::Column::Note, Expr::value(note))
            .filter(ports::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn set_domain_note(&self, id: &str, note: &str) -> Result<bool> {
        let result = Domains::update_many()
            .col_expr(domains::Column::Note, Expr::value(note))
            .filter(domains::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn set_host_style(&self, id: &str, style: Style) -> Result<bool> {
        let result = Hosts::update_many()
            .col_expr(hosts::Column::Style, Expr::value(style.as_str()))
            .filter(hosts::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn set_domain_style(&self, id: &str, style: Style) -> Result<bool> {
        let result = Domains::update_many()
            .col_expr(domains::Column::Style, Expr::value(style.as_str()))
            .filter(domains::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Removes a host together with its ports.
    pub async fn delete_host(&self, id: &str) -> Result<bool> {
        let txn = self.conn.begin().await?;

        Ports::delete_many()
            .filter(ports::Column::Host.eq(id))
            .exec(&txn)
            .await?;

        let result = Hosts::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        Ok(result.rows_affected > 0)
    }

    pub async fn delete_domain(&self, id: &str) -> Result<bool> {
        let result = Domains::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    /// Distinct host IPs of a project matching a port-scan strategy.
    ///
    /// `Explicit` lists are resolved by the caller and yield nothing here.
    pub async fn target_ips(&self, project_id: &str, strategy: ScanStrategy) -> Result<Vec<String>> {
        let mut query = Hosts::find()
            .select_only()
            .column(hosts::Column::Ip)
            .distinct()
            .filter(hosts::Column::Project.eq(project_id));

        match strategy {
            ScanStrategy::Unscanned => {
                query = query.filter(hosts::Column::Portsq.eq(0));
            }
            ScanStrategy::AllKnown => {}
            ScanStrategy::Explicit => return Ok(Vec::new()),
        }

        Ok(query
            .order_by_asc(hosts::Column::Ip)
            .into_tuple::<String>()
            .all(&self.conn)
            .await?)
    }

    pub async fn count_hosts(&self) -> Result<u64> {
        Ok(Hosts::find().count(&self.conn).await?)
    }

    pub async fn count_domains(&self) -> Result<u64> {
        Ok(Domains::find().count(&self.conn).await?)
    }
}

/// `INSERT .. ON CONFLICT(project, ip) DO UPDATE SET style = 'New'`.
///
/// A fresh row starts with an empty note and `portsq` 0; an existing row keeps both.
pub async fn upsert_host<C: ConnectionTrait>(
    conn: &C,
    project_id: &str,
    ip: &str,
) -> Result<hosts::Model> {
    Hosts::insert(new_host(project_id, ip))
        .on_conflict(
            OnConflict::columns([hosts::Column::Project, hosts::Column::Ip])
                .update_column(hosts::Column::Style)
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;

    find_host(conn, project_id, ip)
        .await?
        .context("Host row missing after upsert")
}

/// Creates the host row when absent; never touches an existing one.
async fn ensure_host<C: ConnectionTrait>(conn: &C, project_id: &str, ip: &str) -> Result<()> {
    Hosts::insert(new_host(project_id, ip))
        .on_conflict(
            OnConflict::columns([hosts::Column::Project, hosts::Column::Ip])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn find_host<C: ConnectionTrait>(
    conn: &C,
    project_id: &str,
    ip: &str,
) -> Result<Option<hosts::Model>> {
    Ok(Hosts::find()
        .filter(hosts::Column::Project.eq(project_id))
        .filter(hosts::Column::Ip.eq(ip))
        .one(conn)
        .await?)
}

fn new_host(project_id: &str, ip: &str) -> hosts::ActiveModel {
    hosts::ActiveModel {
        id: Set(uuid::Uuid::new_v4().to_string()),
        project: Set(project_id.to_string()),
        ip: Set(ip.to_string()),
        note: Set(String::new()),
        style: Set(Style::New.to_string()),
        portsq: Set(0),
    }
}

/// `INSERT .. ON CONFLICT(host, port) DO UPDATE SET service, version`.
pub async fn upsert_ports<C: ConnectionTrait>(
    conn: &C,
    host_id: &str,
    observations: &[PortObservation],
) -> Result<()> {
    for obs in observations {
        Ports::insert(ports::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            host: Set(host_id.to_string()),
            port: Set(obs.port.clone()),
            state: Set(PORT_STATE_OPEN.to_string()),
            service: Set(obs.service.clone()),
            version: Set(obs.version.clone()),
            note: Set(String::new()),
        })
        .on_conflict(
            OnConflict::columns([ports::Column::Host, ports::Column::Port])
                .update_columns([ports::Column::Service, ports::Column::Version])
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    }
    Ok(())
}

/// Sets `portsq` to the number of port rows known for the host.
async fn recount_ports<C: ConnectionTrait>(conn: &C, host_id: &str) -> Result<i32> {
    let count = Ports::find()
        .filter(ports::Column::Host.eq(host_id))
        .count(conn)
        .await?;
    let portsq = i32::try_from(count).unwrap_or(i32::MAX);

    Hosts::update_many()
        .col_expr(hosts::Column::Portsq, Expr::value(portsq))
        .filter(hosts::Column::Id.eq(host_id))
        .exec(conn)
        .await?;

    Ok(portsq)
}
