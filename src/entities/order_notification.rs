//! Fan-out audit - Which couriers were offered an order, and when.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order notification database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_notifications")]
pub struct Model {
    /// Offered order
    #[sea_orm(primary_key, auto_increment = false)]
    pub order_id: i64,
    /// Courier the offer was addressed to
    #[sea_orm(primary_key, auto_increment = false)]
    pub courier_id: i64,
    /// When the offer was queued
    pub notified_at: DateTimeUtc,
}

/// Defines relationships between OrderNotification and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Offered order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    /// Targeted courier
    #[sea_orm(
        belongs_to = "super::courier::Entity",
        from = "Column::CourierId",
        to = "super::courier::Column::Id",
        on_delete = "Cascade"
    )]
    Courier,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::courier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Courier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
