//! Promo restriction - Products a promo code is limited to.
//!
//! A code without rows here applies to any product.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Promo product database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promo_products")]
pub struct Model {
    /// Restricted promo code
    #[sea_orm(primary_key, auto_increment = false)]
    pub promo_code_id: i64,
    /// Product the code applies to
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: i64,
}

/// Defines relationships between PromoProduct and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Restricted promo code
    #[sea_orm(
        belongs_to = "super::promo_code::Entity",
        from = "Column::PromoCodeId",
        to = "super::promo_code::Column::Id",
        on_delete = "Cascade"
    )]
    PromoCode,
    /// Eligible product
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::promo_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromoCode.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
