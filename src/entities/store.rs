//! Store entity - A catalog store whose products appear in orders.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Store database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    /// Unique identifier for the store
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Store name
    pub name: String,
}

/// Defines relationships between Store and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One store sells many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
    /// Partner links for this store
    #[sea_orm(has_many = "super::store_partner::Entity")]
    StorePartners,
    /// Promo codes issued by this store
    #[sea_orm(has_many = "super::promo_code::Entity")]
    PromoCodes,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::store_partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StorePartners.def()
    }
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        super::store_partner::Relation::Partner.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::store_partner::Relation::Store.def().rev())
    }
}

impl Related<super::promo_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromoCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
