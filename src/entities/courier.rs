//! Courier entity - A person who claims and delivers orders.
//!
//! A courier is known by a unique phone number. The `channel_handle` is filled in
//! once the courier has linked a chat account; couriers without a handle never
//! receive claim offers.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Courier database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "couriers")]
pub struct Model {
    /// Unique identifier for the courier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Phone number in international format, unique per courier
    #[sea_orm(unique)]
    pub phone_number: String,
    /// Optional display name shown on receipts
    pub name: Option<String>,
    /// Opaque chat handle used as the notification target
    pub channel_handle: Option<String>,
}

impl Model {
    /// Name to show to partners, falling back to the phone number.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.phone_number)
    }
}

/// Defines relationships between Courier and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One courier works many orders
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
