//! Order entity - A delivery job and its dispatch state.
//!
//! Two flavours share this table: store orders (with `order_items`, fulfilled by a
//! partner branch) and courier orders (point-to-point, `pickup_address` set, no items).
//! `courier_id` is set whenever `status` is not `waiting`, and `status` only ever
//! advances `waiting -> en_route -> delivered`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Which kind of job an order represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum OrderKind {
    /// Items bought from stores, fulfilled by a partner branch
    #[sea_orm(string_value = "store")]
    Store,
    /// Point-to-point delivery between two addresses
    #[sea_orm(string_value = "courier")]
    Courier,
}

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentMethod {
    /// QR transfer
    #[sea_orm(string_value = "qr")]
    Qr,
    /// Online payment through the payment gateway
    #[sea_orm(string_value = "gateway")]
    Gateway,
    /// Cash on delivery
    #[sea_orm(string_value = "cash")]
    Cash,
}

/// Lifecycle state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum OrderStatus {
    /// Waiting for a courier to claim it
    #[sea_orm(string_value = "waiting")]
    Waiting,
    /// Claimed and on the way
    #[sea_orm(string_value = "en_route")]
    EnRoute,
    /// Delivered; terminal
    #[sea_orm(string_value = "delivered")]
    Delivered,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Waiting => "waiting",
            Self::EnRoute => "en route",
            Self::Delivered => "delivered",
        })
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// External ID of the customer who placed the order
    pub user_id: i64,
    /// Store order or courier order
    pub kind: OrderKind,
    /// Gross total in minor units (item sum, or the delivery price)
    pub total: i64,
    /// Promo discount applied at branch selection, in minor units
    pub discount: i64,
    /// Destination address
    pub delivery_address: String,
    /// Origin address, courier orders only
    pub pickup_address: Option<String>,
    /// Free-form note from the customer
    pub comment: Option<String>,
    /// Payment method chosen by the customer
    pub payment_method: PaymentMethod,
    /// Current lifecycle state
    pub status: OrderStatus,
    /// Courier that claimed the order
    pub courier_id: Option<i64>,
    /// Branch selected by the courier, store orders only
    pub partner_id: Option<i64>,
    /// Promo code attached at creation
    pub promo_code_id: Option<i64>,
    /// Whether the order has been paid
    pub paid: bool,
    /// When the order was created
    pub created_at: DateTimeUtc,
}

impl Model {
    /// Amount the customer still owes after the promo discount.
    #[must_use]
    pub fn amount_due(&self) -> i64 {
        (self.total - self.discount).max(0)
    }
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The claiming courier
    #[sea_orm(
        belongs_to = "super::courier::Entity",
        from = "Column::CourierId",
        to = "super::courier::Column::Id",
        on_delete = "SetNull"
    )]
    Courier,
    /// The selected branch
    #[sea_orm(
        belongs_to = "super::partner::Entity",
        from = "Column::PartnerId",
        to = "super::partner::Column::Id",
        on_delete = "SetNull"
    )]
    Partner,
    /// The attached promo code
    #[sea_orm(
        belongs_to = "super::promo_code::Entity",
        from = "Column::PromoCodeId",
        to = "super::promo_code::Column::Id",
        on_delete = "SetNull"
    )]
    PromoCode,
    /// Line items, deleted with the order
    #[sea_orm(has_many = "super::order_item::Entity")]
    Items,
    /// Fan-out audit rows
    #[sea_orm(has_many = "super::order_notification::Entity")]
    Notifications,
}

impl Related<super::courier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Courier.def()
    }
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partner.def()
    }
}

impl Related<super::promo_code::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PromoCode.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Items.def()
    }
}

impl Related<super::order_notification::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
