//! Catalog and roster business logic - couriers, partners, stores, products and promo codes.
//!
//! These are the records the dispatch engine reads. Phone numbers are normalised to
//! digits only, which is also how chat accounts are matched when a courier or
//! partner links its handle.

use crate::{
    entities::{
        Courier, Partner, PromoCode, PromoProduct, StorePartner, courier, partner, product,
        promo_code, promo_product, store, store_partner,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::info;

/// Strips everything but ASCII digits from a phone number.
#[must_use]
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

fn require_phone(phone: &str) -> Result<String> {
    let digits = normalize_phone(phone);
    if digits.is_empty() {
        return Err(Error::validation(format!("'{phone}' is not a phone number")));
    }
    Ok(digits)
}

/// Creates a courier. The phone number must be unique.
pub async fn create_courier(
    db: &DatabaseConnection,
    phone_number: &str,
    name: Option<String>,
) -> Result<courier::Model> {
    let courier = courier::ActiveModel {
        phone_number: Set(require_phone(phone_number)?),
        name: Set(name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())),
        channel_handle: Set(None),
        ..Default::default()
    };
    Ok(courier.insert(db).await?)
}

/// Finds a courier by ID.
pub async fn get_courier_by_id<C>(db: &C, courier_id: i64) -> Result<Option<courier::Model>>
where
    C: ConnectionTrait,
{
    Courier::find_by_id(courier_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the courier linked to a chat handle.
pub async fn get_courier_by_handle(
    db: &DatabaseConnection,
    handle: &str,
) -> Result<Option<courier::Model>> {
    Courier::find()
        .filter(courier::Column::ChannelHandle.eq(handle))
        .one(db)
        .await
        .map_err(Into::into)
}

/// All couriers that can receive claim offers, ordered by ID.
pub async fn get_reachable_couriers<C>(db: &C) -> Result<Vec<courier::Model>>
where
    C: ConnectionTrait,
{
    Courier::find()
        .filter(courier::Column::ChannelHandle.is_not_null())
        .order_by_asc(courier::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates a partner branch operator. The phone number must be unique.
pub async fn create_partner(
    db: &DatabaseConnection,
    name: &str,
    address: &str,
    phone_number: &str,
) -> Result<partner::Model> {
    if address.trim().is_empty() {
        return Err(Error::validation("Partner address cannot be empty"));
    }

    let partner = partner::ActiveModel {
        name: Set(name.trim().to_string()),
        address: Set(address.trim().to_string()),
        phone_number: Set(require_phone(phone_number)?),
        channel_handle: Set(None),
        ..Default::default()
    };
    Ok(partner.insert(db).await?)
}

/// Finds a partner by ID.
pub async fn get_partner_by_id<C>(db: &C, partner_id: i64) -> Result<Option<partner::Model>>
where
    C: ConnectionTrait,
{
    Partner::find_by_id(partner_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Creates a store.
pub async fn create_store(db: &DatabaseConnection, name: &str) -> Result<store::Model> {
    if name.trim().is_empty() {
        return Err(Error::validation("Store name cannot be empty"));
    }
    let store = store::ActiveModel {
        name: Set(name.trim().to_string()),
        ..Default::default()
    };
    Ok(store.insert(db).await?)
}

/// Creates a product in `store_id` priced in minor units.
pub async fn create_product(
    db: &DatabaseConnection,
    store_id: i64,
    name: &str,
    description: &str,
    price: i64,
) -> Result<product::Model> {
    if price < 0 {
        return Err(Error::validation(format!("Product price cannot be negative: {price}")));
    }
    let product = product::ActiveModel {
        store_id: Set(store_id),
        name: Set(name.trim().to_string()),
        description: Set(description.trim().to_string()),
        price: Set(price),
        ..Default::default()
    };
    Ok(product.insert(db).await?)
}

/// Makes `partner_id` a branch of `store_id`. Linking twice is a no-op.
pub async fn link_branch(db: &DatabaseConnection, store_id: i64, partner_id: i64) -> Result<()> {
    let existing = StorePartner::find_by_id((store_id, partner_id)).one(db).await?;
    if existing.is_some() {
        return Ok(());
    }

    let link = store_partner::ActiveModel {
        store_id: Set(store_id),
        partner_id: Set(partner_id),
    };
    StorePartner::insert(link).exec_without_returning(db).await?;
    Ok(())
}

/// Input for [`create_promo_code`].
#[derive(Debug, Clone)]
pub struct NewPromoCode {
    /// Issuing store
    pub store_id: i64,
    /// Code string, unique
    pub code: String,
    /// Fixed discount in minor units
    pub discount_amount: i64,
    /// Minimum order total in minor units
    pub min_order_sum: i64,
    /// Start of the validity window
    pub valid_from: DateTime<Utc>,
    /// End of the validity window
    pub valid_until: DateTime<Utc>,
    /// Maximum number of redemptions
    pub usage_limit: Option<i32>,
    /// Products the code is restricted to; empty means any product
    pub product_ids: Vec<i64>,
}

/// Creates a promo code and its product restriction.
///
/// The window must end after it starts, amounts must be non-negative and the
/// limit, when set, must be positive.
pub async fn create_promo_code(
    db: &DatabaseConnection,
    new_code: NewPromoCode,
) -> Result<promo_code::Model> {
    if new_code.code.trim().is_empty() {
        return Err(Error::validation("Promo code cannot be empty"));
    }
    if new_code.valid_until <= new_code.valid_from {
        return Err(Error::validation("Promo validity must end after it starts"));
    }
    if new_code.discount_amount < 0 || new_code.min_order_sum < 0 {
        return Err(Error::validation("Promo amounts cannot be negative"));
    }
    if new_code.usage_limit.is_some_and(|limit| limit <= 0) {
        return Err(Error::validation("Promo usage limit must be positive"));
    }

    let txn = db.begin().await?;

    let promo = promo_code::ActiveModel {
        store_id: Set(new_code.store_id),
        code: Set(new_code.code.trim().to_string()),
        discount_amount: Set(new_code.discount_amount),
        min_order_sum: Set(new_code.min_order_sum),
        valid_from: Set(new_code.valid_from),
        valid_until: Set(new_code.valid_until),
        usage_limit: Set(new_code.usage_limit),
        used_count: Set(0),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let mut product_ids = new_code.product_ids;
    product_ids.sort_unstable();
    product_ids.dedup();
    if !product_ids.is_empty() {
        let rows = product_ids
            .into_iter()
            .map(|product_id| promo_product::ActiveModel {
                promo_code_id: Set(promo.id),
                product_id: Set(product_id),
            });
        PromoProduct::insert_many(rows)
            .exec_without_returning(&txn)
            .await?;
    }

    txn.commit().await?;
    Ok(promo)
}

/// Finds a promo code by its code string.
pub async fn get_promo_by_code<C>(db: &C, code: &str) -> Result<Option<promo_code::Model>>
where
    C: ConnectionTrait,
{
    PromoCode::find()
        .filter(promo_code::Column::Code.eq(code.trim()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// The account a chat handle was linked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkedAccount {
    /// The phone belongs to a courier
    Courier(courier::Model),
    /// The phone belongs to a partner
    Partner(partner::Model),
}

/// Links a chat handle to the courier or partner registered under `phone`.
///
/// Couriers are matched first, then partners. Returns `None` when neither is known.
pub async fn link_channel_handle(
    db: &DatabaseConnection,
    phone: &str,
    handle: &str,
) -> Result<Option<LinkedAccount>> {
    let digits = normalize_phone(phone);
    if digits.is_empty() {
        return Ok(None);
    }

    if let Some(found) = Courier::find()
        .filter(courier::Column::PhoneNumber.eq(digits.as_str()))
        .one(db)
        .await?
    {
        let mut active: courier::ActiveModel = found.into();
        active.channel_handle = Set(Some(handle.to_string()));
        let updated = active.update(db).await?;
        info!(courier_id = updated.id, "Linked chat handle to courier");
        return Ok(Some(LinkedAccount::Courier(updated)));
    }

    if let Some(found) = Partner::find()
        .filter(partner::Column::PhoneNumber.eq(digits.as_str()))
        .one(db)
        .await?
    {
        let mut active: partner::ActiveModel = found.into();
        active.channel_handle = Set(Some(handle.to_string()));
        let updated = active.update(db).await?;
        info!(partner_id = updated.id, "Linked chat handle to partner");
        return Ok(Some(LinkedAccount::Partner(updated)));
    }

    Ok(None)
}
