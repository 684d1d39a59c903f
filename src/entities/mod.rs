//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod courier;
pub mod order;
pub mod order_item;
pub mod order_notification;
pub mod partner;
pub mod product;
pub mod promo_code;
pub mod promo_product;
pub mod promo_redemption;
pub mod store;
pub mod store_partner;

// Re-export specific types to avoid conflicts
pub use courier::{Column as CourierColumn, Entity as Courier, Model as CourierModel};
pub use order::{
    Column as OrderColumn, Entity as Order, Model as OrderModel, OrderKind, OrderStatus,
    PaymentMethod,
};
pub use order_item::{Column as OrderItemColumn, Entity as OrderItem, Model as OrderItemModel};
pub use order_notification::{
    Column as OrderNotificationColumn, Entity as OrderNotification,
    Model as OrderNotificationModel,
};
pub use partner::{Column as PartnerColumn, Entity as Partner, Model as PartnerModel};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use promo_code::{Column as PromoCodeColumn, Entity as PromoCode, Model as PromoCodeModel};
pub use promo_product::{
    Column as PromoProductColumn, Entity as PromoProduct, Model as PromoProductModel,
};
pub use promo_redemption::{
    Column as PromoRedemptionColumn, Entity as PromoRedemption, Model as PromoRedemptionModel,
};
pub use store::{Column as StoreColumn, Entity as Store, Model as StoreModel};
pub use store_partner::{
    Column as StorePartnerColumn, Entity as StorePartner, Model as StorePartnerModel,
};
