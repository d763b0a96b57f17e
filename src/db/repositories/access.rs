use crate::domain::ResourceKind;
use crate::entities::{crontab, domains, hosts, ports, prelude::*, projects};
use anyhow::Result;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QuerySelect,
    RelationTrait,
};

/// Resolves any owned resource to the project it belongs to.
pub struct AccessRepository {
    conn: DatabaseConnection,
}

impl AccessRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn owning_project(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<projects::Model>> {
        let query = match kind {
            ResourceKind::Project => Projects::find().filter(projects::Column::Id.eq(id)),
            ResourceKind::Host => Projects::find()
                .join(JoinType::InnerJoin, projects::Relation::Hosts.def())
                .filter(hosts::Column::Id.eq(id)),
            ResourceKind::Port => Projects::find()
                .join(JoinType::InnerJoin, projects::Relation::Hosts.def())
                .join(JoinType::InnerJoin, hosts::Relation::Ports.def())
                .filter(ports::Column::Id.eq(id)),
            ResourceKind::Domain => Projects::find()
                .join(JoinType::InnerJoin, projects::Relation::Domains.def())
                .filter(domains::Column::Id.eq(id)),
            ResourceKind::CronTask => Projects::find()
                .join(JoinType::InnerJoin, projects::Relation::Crontab.def())
                .filter(crontab::Column::Id.eq(id)),
        };

        Ok(query.one(&self.conn).await?)
    }
}
