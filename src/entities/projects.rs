use sea_orm::entity::prelude::*;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// Username of the analyst owning the project
    pub owner: String,
    pub created_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::hosts::Entity")]
    Hosts,
    #[sea_orm(has_many = "super::domains::Entity")]
    Domains,
    #[sea_orm(has_many = "super::crontab::Entity")]
    Crontab,
    #[sea_orm(has_many = "super::scan_runs::Entity")]
    ScanRuns,
}

impl Related<super::hosts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Hosts.def()
    }
}

impl Related<super::domains::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Domains.def()
    }
}

impl Related<super::crontab::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Crontab.def()
    }
}

impl Related<super::scan_runs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScanRuns.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
