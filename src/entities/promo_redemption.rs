//! Promo redemption - A user's single use of a promo code.
//!
//! The composite primary key makes a second redemption by the same user fail at
//! the database level.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Promo redemption database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promo_redemptions")]
pub struct Model {
    /// Redeemed promo code
    #[sea_orm(primary_key, auto_increment = false)]
    pub promo_code_id: i64,
    /// External ID of the redeeming user
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// When the redemption happened
    pub redeemed_at: DateTimeUtc,
}

/// Defines relationships between PromoRedemption and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Redeemed promo code
    #[sea_orm(
        belongs_to = "super::promo_code::Entity",
        from = "Column::PromoCodeId",
        to = "super::promo_code::Column::Id",
        on_delete = "Cascade"
    )]
    PromoCode,
}

impl Related<super::promo_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromoCode.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
