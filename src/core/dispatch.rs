//! Dispatch engine - the order, claim, branch and completion state machine.
//!
//! An order moves `waiting -> en_route -> delivered` and never back. Every transition
//! that can race (claiming and completing) is a guarded write, so two couriers
//! pressing "take" at the same moment get exactly one `Claimed` and one
//! `AlreadyClaimed`. Messages to couriers and partners are built here and handed
//! to the [`Outbox`] after the database work is committed. Once a transition is
//! written, failing to look up a message recipient is logged and never turns the
//! result into an error.

use crate::{
    core::{
        catalog::{get_courier_by_id, get_partner_by_id, get_promo_by_code, get_reachable_couriers},
        guard::{Guarded, apply_guarded, begin_write},
        money::{format_amount, line_total},
        promo::redeem_promo,
    },
    entities::{
        Order, OrderItem, OrderKind, OrderNotification, OrderStatus, Partner, PaymentMethod,
        Product, PromoCode, StorePartner, courier, order, order_item, order_notification,
        partner, product, store_partner,
    },
    errors::{Error, PromoRejection, Result},
    notify::{Action, ActionToken, Notification, Outbox},
};
use chrono::Utc;
use sea_orm::{QueryOrder, QuerySelect, Set, prelude::*};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, instrument, warn};

/// Payment status reported by the gateway for a completed payment.
pub const PAYMENT_SUCCESS: &str = "success";

/// How many orders [`list_orders_for_user`] returns.
const RECENT_ORDERS_LIMIT: u64 = 25;

/// One product line of a new store order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewItem {
    /// Product being ordered
    pub product_id: i64,
    /// How many, must be positive
    pub quantity: i32,
}

/// What the courier has to do for an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fulfilment {
    /// Pick the items up at a partner branch and deliver them
    Store {
        /// Ordered products; each product at most once
        items: Vec<NewItem>,
        /// Destination address
        delivery_address: String,
    },
    /// Carry something from one address to another
    Courier {
        /// Origin address
        pickup_address: String,
        /// Destination address
        delivery_address: String,
        /// Agreed price in minor units
        delivery_price: i64,
        /// Note for the courier
        comment: Option<String>,
    },
}

/// Input for [`create_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    /// External ID of the customer
    pub user_id: i64,
    /// Store or courier job
    pub fulfilment: Fulfilment,
    /// How the customer pays
    pub payment_method: PaymentMethod,
    /// Courier the offer should go to instead of everyone
    pub courier_id: Option<i64>,
    /// Promo code to apply once a branch is chosen
    pub promo_code: Option<String>,
}

/// Result of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now owns the order
    Claimed(order::Model),
    /// Someone else got there first
    AlreadyClaimed {
        /// The courier holding the order, if it could be read back
        by: Option<i64>,
    },
}

impl ClaimOutcome {
    /// Whether the caller won the claim.
    #[must_use]
    pub const fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed(_))
    }
}

/// One line of a branch receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptLine {
    /// Product ID
    pub product_id: i64,
    /// Product name at the time of selection
    pub name: String,
    /// Ordered quantity
    pub quantity: i32,
    /// Price per unit in minor units
    pub unit_price: i64,
    /// `unit_price * quantity`
    pub line_total: i64,
}

/// What happened to the order's promo code at branch selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromoOutcome {
    /// Redeemed; `discount` was taken off the total
    Applied {
        /// The promo code
        code: String,
        /// Discount actually granted, never more than the subtotal
        discount: i64,
    },
    /// The ledger refused the code
    Rejected {
        /// The promo code
        code: String,
        /// Why it was refused
        reason: PromoRejection,
    },
    /// The code's store is not served by the chosen branch
    NotServed {
        /// The promo code
        code: String,
    },
}

/// The bill a partner prepares an order from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Order ID
    pub order_id: i64,
    /// Branch that was selected
    pub partner_id: i64,
    /// Where the courier takes the items
    pub delivery_address: String,
    /// Items the branch prepares
    pub lines: Vec<ReceiptLine>,
    /// Sum of the line totals
    pub subtotal: i64,
    /// Promo handling, when the order carried a code
    pub promo: Option<PromoOutcome>,
    /// Amount due after the discount
    pub total: i64,
}

impl Receipt {
    /// Discount granted by the promo code, zero if none applied.
    #[must_use]
    pub fn discount(&self) -> i64 {
        match &self.promo {
            Some(PromoOutcome::Applied { discount, .. }) => *discount,
            _ => 0,
        }
    }

    /// Renders the receipt as a chat message.
    #[must_use]
    pub fn render(&self) -> String {
        let mut text = format!("Order #{}\n", self.order_id);
        for line in &self.lines {
            text.push_str(&format!(
                "{} x{} = {}\n",
                line.name,
                line.quantity,
                format_amount(line.line_total)
            ));
        }
        text.push_str(&format!("Subtotal: {}\n", format_amount(self.subtotal)));
        match &self.promo {
            Some(PromoOutcome::Applied { code, discount }) => {
                text.push_str(&format!("Promo {code}: -{}\n", format_amount(*discount)));
            }
            Some(PromoOutcome::Rejected { code, reason }) => {
                text.push_str(&format!("Promo {code} not applied: {reason}\n"));
            }
            Some(PromoOutcome::NotServed { code }) => {
                text.push_str(&format!("Promo {code} is not valid at this branch\n"));
            }
            None => {}
        }
        text.push_str(&format!("Total: {}\n", format_amount(self.total)));
        text.push_str(&format!("Deliver to: {}", self.delivery_address));
        text
    }
}

fn invalid_order(message: impl Into<String>) -> Error {
    Error::InvalidOrder {
        message: message.into(),
    }
}

fn non_blank(value: &str, what: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid_order(format!("{what} cannot be empty")));
    }
    Ok(trimmed.to_string())
}

/// Finds an order by ID, failing with `NotFound`.
pub async fn get_order<C>(db: &C, order_id: i64) -> Result<order::Model>
where
    C: ConnectionTrait,
{
    Order::find_by_id(order_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("order", order_id))
}

/// The most recent orders placed by a customer, newest first.
pub async fn list_orders_for_user(
    db: &DatabaseConnection,
    user_id: i64,
) -> Result<Vec<order::Model>> {
    Order::find()
        .filter(order::Column::UserId.eq(user_id))
        .order_by_desc(order::Column::Id)
        .limit(RECENT_ORDERS_LIMIT)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Item lines of an order joined with their products, ordered by product ID.
pub async fn get_order_lines<C>(
    db: &C,
    order_id: i64,
) -> Result<Vec<(order_item::Model, product::Model)>>
where
    C: ConnectionTrait,
{
    OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::ProductId)
        .find_also_related(Product)
        .all(db)
        .await?
        .into_iter()
        .map(|(item, product)| {
            let product_id = item.product_id;
            product
                .map(|p| (item, p))
                .ok_or_else(|| Error::not_found("product", product_id))
        })
        .collect()
}

/// Partners that are a branch of every store in `store_ids`.
async fn fulfilling_partner_ids<C>(db: &C, store_ids: &BTreeSet<i64>) -> Result<BTreeSet<i64>>
where
    C: ConnectionTrait,
{
    if store_ids.is_empty() {
        return Ok(BTreeSet::new());
    }

    let links = StorePartner::find()
        .filter(store_partner::Column::StoreId.is_in(store_ids.iter().copied()))
        .all(db)
        .await?;

    let mut served: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for link in links {
        served.entry(link.partner_id).or_default().insert(link.store_id);
    }

    Ok(served
        .into_iter()
        .filter(|(_, stores)| stores.len() == store_ids.len())
        .map(|(partner_id, _)| partner_id)
        .collect())
}

fn stores_of(lines: &[(order_item::Model, product::Model)]) -> BTreeSet<i64> {
    lines.iter().map(|(_, product)| product.store_id).collect()
}

/// Branches able to fulfil every item of an order.
///
/// Courier orders have no items and therefore no candidates.
pub async fn branch_candidates<C>(db: &C, order_id: i64) -> Result<Vec<partner::Model>>
where
    C: ConnectionTrait,
{
    let order = get_order(db, order_id).await?;
    if order.kind == OrderKind::Courier {
        return Ok(Vec::new());
    }

    let lines = get_order_lines(db, order_id).await?;
    let partner_ids = fulfilling_partner_ids(db, &stores_of(&lines)).await?;
    if partner_ids.is_empty() {
        return Ok(Vec::new());
    }

    Partner::find()
        .filter(partner::Column::Id.is_in(partner_ids))
        .order_by_asc(partner::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

fn offer_text(order: &order::Model) -> String {
    let mut text = format!("New order #{}\n", order.id);
    if let Some(pickup) = &order.pickup_address {
        text.push_str(&format!("Pickup: {pickup}\n"));
    }
    text.push_str(&format!("Address: {}\n", order.delivery_address));
    if let Some(comment) = &order.comment {
        text.push_str(&format!("Comment: {comment}\n"));
    }
    text.push_str(&format!("Total: {}", format_amount(order.total)));
    text
}

/// Checks the items of a store order: at least one, positive quantities, and no
/// product twice.
pub fn validate_items(items: &[NewItem]) -> Result<()> {
    if items.is_empty() {
        return Err(invalid_order("a store order needs at least one item"));
    }
    let mut seen = HashSet::new();
    for item in items {
        if item.quantity <= 0 {
            return Err(invalid_order(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }
        if !seen.insert(item.product_id) {
            return Err(invalid_order(format!(
                "product {} appears more than once",
                item.product_id
            )));
        }
    }
    Ok(())
}

/// Total of `items` at current product prices, in minor units.
pub async fn price_items<C>(db: &C, items: &[NewItem]) -> Result<i64>
where
    C: ConnectionTrait,
{
    let product_ids: Vec<i64> = items.iter().map(|item| item.product_id).collect();
    let prices: BTreeMap<i64, i64> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p.price))
        .collect();

    let mut total: i64 = 0;
    for item in items {
        let price = prices
            .get(&item.product_id)
            .copied()
            .ok_or_else(|| Error::not_found("product", item.product_id))?;
        total = line_total(price, item.quantity)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| invalid_order("order total is too large"))?;
    }
    Ok(total)
}

/// Creates an order in `waiting` and offers it to couriers.
///
/// The offer goes to the pre-assigned courier when there is one, otherwise to every
/// courier with a linked chat handle. Each target is recorded in
/// `order_notifications`.
#[instrument(skip(db, outbox))]
pub async fn create_order(db: &DatabaseConnection, outbox: &Outbox, new_order: NewOrder) -> Result<i64> {
    let NewOrder {
        user_id,
        fulfilment,
        payment_method,
        courier_id,
        promo_code,
    } = new_order;

    // Validate the request shape before touching the database
    match &fulfilment {
        Fulfilment::Store { items, .. } => validate_items(items)?,
        Fulfilment::Courier { delivery_price, .. } => {
            if *delivery_price < 0 {
                return Err(invalid_order("delivery price cannot be negative"));
            }
        }
    }

    let txn = begin_write(db).await?;

    let assigned = match courier_id {
        Some(id) => Some(
            get_courier_by_id(&txn, id)
                .await?
                .ok_or_else(|| Error::not_found("courier", id))?,
        ),
        None => None,
    };

    let promo_code_id = match promo_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(code) => Some(
            get_promo_by_code(&txn, code)
                .await?
                .ok_or_else(|| Error::not_found("promo code", code))?
                .id,
        ),
        None => None,
    };

    let (kind, total, delivery_address, pickup_address, comment, items) = match fulfilment {
        Fulfilment::Store {
            items,
            delivery_address,
        } => {
            let delivery_address = non_blank(&delivery_address, "delivery address")?;
            let total = price_items(&txn, &items).await?;
            (OrderKind::Store, total, delivery_address, None, None, items)
        }
        Fulfilment::Courier {
            pickup_address,
            delivery_address,
            delivery_price,
            comment,
        } => (
            OrderKind::Courier,
            delivery_price,
            non_blank(&delivery_address, "delivery address")?,
            Some(non_blank(&pickup_address, "pickup address")?),
            comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            Vec::new(),
        ),
    };

    let order = order::ActiveModel {
        user_id: Set(user_id),
        kind: Set(kind),
        total: Set(total),
        discount: Set(0),
        delivery_address: Set(delivery_address),
        pickup_address: Set(pickup_address),
        comment: Set(comment),
        payment_method: Set(payment_method),
        status: Set(OrderStatus::Waiting),
        courier_id: Set(None),
        partner_id: Set(None),
        promo_code_id: Set(promo_code_id),
        paid: Set(false),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if !items.is_empty() {
        let rows = items.iter().map(|item| order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
        });
        OrderItem::insert_many(rows)
            .exec_without_returning(&txn)
            .await?;
    }

    let targets: Vec<courier::Model> = match assigned {
        Some(courier) if courier.channel_handle.is_some() => vec![courier],
        Some(_) => Vec::new(),
        None => get_reachable_couriers(&txn).await?,
    };

    if !targets.is_empty() {
        let now = Utc::now();
        let rows = targets.iter().map(|courier| order_notification::ActiveModel {
            order_id: Set(order.id),
            courier_id: Set(courier.id),
            notified_at: Set(now),
        });
        OrderNotification::insert_many(rows)
            .exec_without_returning(&txn)
            .await?;
    }

    txn.commit().await?;

    info!(
        order_id = order.id,
        user_id,
        total = %format_amount(order.total),
        targets = targets.len(),
        "Order created"
    );

    let text = offer_text(&order);
    let batch = targets
        .into_iter()
        .filter_map(|courier| courier.channel_handle)
        .map(|channel| {
            Notification::text(channel, text.clone()).with_action(Action::new(
                "Take order",
                ActionToken::Claim { order_id: order.id },
            ))
        })
        .collect();
    outbox.send(batch);

    Ok(order.id)
}

/// Claims a waiting order for `courier_id`.
///
/// Losing the race is a normal result, [`ClaimOutcome::AlreadyClaimed`]. The winner
/// is sent its next steps: the branches that can fulfil the order and a button to
/// mark it delivered.
#[instrument(skip(db, outbox))]
pub async fn claim_order(
    db: &DatabaseConnection,
    outbox: &Outbox,
    order_id: i64,
    courier_id: i64,
) -> Result<ClaimOutcome> {
    let courier = get_courier_by_id(db, courier_id)
        .await?
        .ok_or_else(|| Error::not_found("courier", courier_id))?;
    let mut order = get_order(db, order_id).await?;

    let claim = Order::update_many()
        .set(order::ActiveModel {
            courier_id: Set(Some(courier_id)),
            status: Set(OrderStatus::EnRoute),
            ..Default::default()
        })
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::CourierId.is_null())
        .filter(order::Column::Status.eq(OrderStatus::Waiting));

    if apply_guarded(db, claim).await? == Guarded::Rejected {
        let by = get_order(db, order_id).await?.courier_id;
        debug!(order_id, courier_id, ?by, "Claim lost");
        return Ok(ClaimOutcome::AlreadyClaimed { by });
    }
    order.courier_id = Some(courier_id);
    order.status = OrderStatus::EnRoute;

    info!(order_id, courier_id, "Order claimed");

    if let Some(channel) = courier.channel_handle {
        let mut text = format!("You took order #{order_id}\nDeliver to: {}", order.delivery_address);
        if let Some(pickup) = &order.pickup_address {
            text.push_str(&format!("\nPick up at: {pickup}"));
        }

        let mut actions = Vec::new();
        if order.kind == OrderKind::Store {
            match branch_candidates(db, order_id).await {
                Ok(branches) if branches.is_empty() => {
                    text.push_str("\nNo single branch can fulfil every item of this order.");
                }
                Ok(branches) => {
                    text.push_str("\nChoose the branch to collect from:");
                    actions.extend(branches.into_iter().map(|branch| {
                        Action::new(
                            format!("{} ({})", branch.name, branch.address),
                            ActionToken::SelectBranch {
                                order_id,
                                partner_id: branch.id,
                            },
                        )
                    }));
                }
                Err(e) => {
                    warn!(order_id, "Could not list branches for claimed order: {e}");
                    text.push_str("\nThe branch list is unavailable right now.");
                }
            }
        }
        actions.push(Action::new("Delivered", ActionToken::Complete { order_id }));

        outbox.send(vec![Notification {
            channel,
            text,
            actions,
        }]);
    }

    Ok(ClaimOutcome::Claimed(order))
}

/// Chat handle of a courier, for messages sent after a transition is written.
async fn courier_channel(db: &DatabaseConnection, order_id: i64, courier_id: i64) -> Option<String> {
    match get_courier_by_id(db, courier_id).await {
        Ok(courier) => courier.and_then(|courier| courier.channel_handle),
        Err(e) => {
            warn!(order_id, courier_id, "Could not look up courier to notify: {e}");
            None
        }
    }
}

/// Chat handle of a partner, for messages sent after a transition is written.
async fn partner_channel(db: &DatabaseConnection, order_id: i64, partner_id: i64) -> Option<String> {
    match get_partner_by_id(db, partner_id).await {
        Ok(partner) => partner.and_then(|partner| partner.channel_handle),
        Err(e) => {
            warn!(order_id, partner_id, "Could not look up partner to notify: {e}");
            None
        }
    }
}

/// Selects the branch that prepares a claimed store order and returns its receipt.
///
/// Only the claimant may choose, and only once. The branch must serve every store in
/// the order. A promo code attached to the order is redeemed here when its store is
/// served by the branch; a refused code is noted on the receipt and does not block
/// the selection.
#[instrument(skip(db, outbox))]
pub async fn select_branch(
    db: &DatabaseConnection,
    outbox: &Outbox,
    order_id: i64,
    courier_id: i64,
    partner_id: i64,
) -> Result<Receipt> {
    let txn = begin_write(db).await?;

    let order = get_order(&txn, order_id).await?;
    let branch = get_partner_by_id(&txn, partner_id)
        .await?
        .ok_or_else(|| Error::not_found("partner", partner_id))?;

    if order.courier_id != Some(courier_id) {
        return Err(Error::Forbidden {
            order_id,
            courier_id,
        });
    }
    if order.kind == OrderKind::Courier {
        return Err(Error::invalid_state(order_id, "courier orders have no branch"));
    }
    if order.status != OrderStatus::EnRoute {
        return Err(Error::invalid_state(
            order_id,
            format!("cannot select a branch while {}", order.status),
        ));
    }
    if order.partner_id.is_some() {
        return Err(Error::invalid_state(order_id, "a branch is already selected"));
    }

    let lines = get_order_lines(&txn, order_id).await?;
    let candidates = fulfilling_partner_ids(&txn, &stores_of(&lines)).await?;
    if candidates.is_empty() {
        return Err(Error::NoFulfillingBranch { order_id });
    }
    if !candidates.contains(&partner_id) {
        return Err(Error::BranchCannotFulfil {
            order_id,
            partner_id,
        });
    }

    let selection = Order::update_many()
        .set(order::ActiveModel {
            partner_id: Set(Some(partner_id)),
            ..Default::default()
        })
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::CourierId.eq(courier_id))
        .filter(order::Column::Status.eq(OrderStatus::EnRoute))
        .filter(order::Column::PartnerId.is_null());
    if apply_guarded(&txn, selection).await? == Guarded::Rejected {
        return Err(Error::invalid_state(order_id, "a branch is already selected"));
    }

    let served_stores: BTreeSet<i64> = StorePartner::find()
        .filter(store_partner::Column::PartnerId.eq(partner_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|link| link.store_id)
        .collect();

    let mut receipt_lines = Vec::with_capacity(lines.len());
    let mut subtotal: i64 = 0;
    for (item, product) in lines {
        if !served_stores.contains(&product.store_id) {
            continue;
        }
        let total = line_total(product.price, item.quantity)
            .filter(|line| subtotal.checked_add(*line).is_some())
            .ok_or_else(|| invalid_order("order total is too large"))?;
        subtotal += total;
        receipt_lines.push(ReceiptLine {
            product_id: product.id,
            line_total: total,
            name: product.name,
            quantity: item.quantity,
            unit_price: product.price,
        });
    }

    let promo = match order.promo_code_id {
        Some(promo_id) => match PromoCode::find_by_id(promo_id).one(&txn).await? {
            Some(promo) if served_stores.contains(&promo.store_id) => {
                let product_ids: Vec<i64> =
                    receipt_lines.iter().map(|line| line.product_id).collect();
                match redeem_promo(&txn, &promo.code, order.user_id, subtotal, &product_ids).await
                {
                    Ok(discounted) => Some(PromoOutcome::Applied {
                        code: promo.code,
                        discount: subtotal - discounted,
                    }),
                    Err(Error::Promo(reason)) => {
                        debug!(order_id, %reason, "Promo code refused at branch selection");
                        Some(PromoOutcome::Rejected {
                            code: promo.code,
                            reason,
                        })
                    }
                    Err(e) => return Err(e),
                }
            }
            Some(promo) => Some(PromoOutcome::NotServed { code: promo.code }),
            None => None,
        },
        None => None,
    };

    let mut receipt = Receipt {
        order_id,
        partner_id,
        delivery_address: order.delivery_address.clone(),
        lines: receipt_lines,
        subtotal,
        promo,
        total: subtotal,
    };
    receipt.total = (subtotal - receipt.discount()).max(0);

    if receipt.discount() > 0 {
        Order::update_many()
            .set(order::ActiveModel {
                discount: Set(receipt.discount()),
                ..Default::default()
            })
            .filter(order::Column::Id.eq(order_id))
            .exec(&txn)
            .await?;
    }

    txn.commit().await?;

    info!(
        order_id,
        courier_id,
        partner_id,
        total = %format_amount(receipt.total),
        "Branch selected"
    );

    let mut batch = Vec::new();
    if let Some(channel) = branch.channel_handle.clone() {
        batch.push(Notification::text(channel, receipt.render()));
    }
    if let Some(channel) = courier_channel(db, order_id, courier_id).await {
        batch.push(Notification::text(
            channel,
            format!(
                "{} ({}) will prepare order #{order_id}. Total: {}",
                branch.name,
                branch.address,
                format_amount(receipt.total)
            ),
        ));
    }
    outbox.send(batch);

    Ok(receipt)
}

/// Marks an en-route order delivered and paid.
///
/// Cash is settled on delivery, so completion also sets the paid flag.
#[instrument(skip(db, outbox))]
pub async fn complete_order(
    db: &DatabaseConnection,
    outbox: &Outbox,
    order_id: i64,
    courier_id: i64,
) -> Result<order::Model> {
    let mut order = get_order(db, order_id).await?;
    if order.status != OrderStatus::EnRoute {
        return Err(Error::invalid_state(
            order_id,
            format!("cannot complete an order that is {}", order.status),
        ));
    }
    if order.courier_id != Some(courier_id) {
        return Err(Error::Forbidden {
            order_id,
            courier_id,
        });
    }

    let completion = Order::update_many()
        .set(order::ActiveModel {
            status: Set(OrderStatus::Delivered),
            paid: Set(true),
            ..Default::default()
        })
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::CourierId.eq(courier_id))
        .filter(order::Column::Status.eq(OrderStatus::EnRoute));

    if apply_guarded(db, completion).await? == Guarded::Rejected {
        return Err(Error::invalid_state(order_id, "order is no longer en route"));
    }
    order.status = OrderStatus::Delivered;
    order.paid = true;

    info!(order_id, courier_id, "Order delivered");

    let mut batch = Vec::new();
    if let Some(channel) = courier_channel(db, order_id, courier_id).await {
        batch.push(Notification::text(
            channel,
            format!("Order #{order_id} is delivered. Thank you!"),
        ));
    }
    if let Some(partner_id) = order.partner_id {
        if let Some(channel) = partner_channel(db, order_id, partner_id).await {
            batch.push(Notification::text(
                channel,
                format!("Order #{order_id} has been delivered."),
            ));
        }
    }
    outbox.send(batch);

    Ok(order)
}

/// Records a polled gateway payment status against an order.
///
/// Only [`PAYMENT_SUCCESS`] marks the order paid. Returns whether this call changed
/// the paid flag.
pub async fn mark_paid<C>(db: &C, order_id: i64, payment_status: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    get_order(db, order_id).await?;
    if payment_status != PAYMENT_SUCCESS {
        debug!(order_id, payment_status, "Payment not settled yet");
        return Ok(false);
    }

    let settle = Order::update_many()
        .set(order::ActiveModel {
            paid: Set(true),
            ..Default::default()
        })
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Paid.eq(false));

    let changed = apply_guarded(db, settle).await?.is_applied();
    if changed {
        info!(order_id, "Order marked paid");
    }
    Ok(changed)
}
