//! Promo code entity - A fixed discount issued by a store.
//!
//! `used_count` only grows and never exceeds `usage_limit` when a limit is set.
//! Product restrictions live in `promo_products`; the set of users who already
//! redeemed the code lives in `promo_redemptions`.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Promo code database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "promo_codes")]
pub struct Model {
    /// Unique identifier for the promo code
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Store that issued the code
    pub store_id: i64,
    /// The code customers type, unique across stores
    #[sea_orm(unique)]
    pub code: String,
    /// Fixed discount in minor units
    pub discount_amount: i64,
    /// Minimum order total in minor units for the code to apply
    pub min_order_sum: i64,
    /// Start of the validity window (inclusive)
    pub valid_from: DateTimeUtc,
    /// End of the validity window (inclusive)
    pub valid_until: DateTimeUtc,
    /// Maximum number of redemptions, unlimited when `None`
    pub usage_limit: Option<i32>,
    /// Number of redemptions so far
    pub used_count: i32,
}

impl Model {
    /// Whether `now` falls inside the validity window.
    #[must_use]
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from <= now && now <= self.valid_until
    }

    /// Whether the usage limit has been reached.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit.is_some_and(|limit| self.used_count >= limit)
    }
}

/// Defines relationships between PromoCode and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Issuing store
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::Id",
        on_delete = "Cascade"
    )]
    Store,
    /// Product restriction rows
    #[sea_orm(has_many = "super::promo_product::Entity")]
    Products,
    /// Redemption rows
    #[sea_orm(has_many = "super::promo_redemption::Entity")]
    Redemptions,
    /// Orders carrying this code
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::promo_product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl Related<super::promo_redemption::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Redemptions.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
