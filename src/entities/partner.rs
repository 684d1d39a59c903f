//! Partner entity - A branch operator that fulfils store orders.
//!
//! Partners are linked to stores through `store_partners`; every store a partner
//! serves is one of its branches.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Partner database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "partners")]
pub struct Model {
    /// Unique identifier for the partner
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Partner name
    pub name: String,
    /// Street address of the branch, shown to couriers when picking a branch
    pub address: String,
    /// Phone number in international format, unique per partner
    #[sea_orm(unique)]
    pub phone_number: String,
    /// Opaque chat handle used as the notification target
    pub channel_handle: Option<String>,
}

/// Defines relationships between Partner and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Store links for this partner
    #[sea_orm(has_many = "super::store_partner::Entity")]
    StorePartners,
    /// Orders fulfilled by this partner
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::store_partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StorePartners.def()
    }
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        super::store_partner::Relation::Store.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::store_partner::Relation::Partner.def().rev())
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
