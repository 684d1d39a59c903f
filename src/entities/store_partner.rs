//! Branch link - Many-to-many relation between stores and partners.
//!
//! A row means the partner can fulfil items sold by the store.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Store/partner link model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_partners")]
pub struct Model {
    /// Linked store
    #[sea_orm(primary_key, auto_increment = false)]
    pub store_id: i64,
    /// Linked partner
    #[sea_orm(primary_key, auto_increment = false)]
    pub partner_id: i64,
}

/// Defines relationships between the link and its endpoints
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The store side of the link
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id",
        on_delete = "Cascade"
    )]
    Store,
    /// The partner side of the link
    #[sea_orm(
        belongs_to = "super::partner::Entity",
        from = "Column::PartnerId",
        to = "super::partner::Column::Id",
        on_delete = "Cascade"
    )]
    Partner,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
