//! Customer Discord commands - `order`, `deliver`, `promo`, `orders`, `pay` and
//! `payment_status`.
//!
//! The customer's Discord user ID is the order's user ID.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        core::{
            dispatch::{self, Fulfilment, NewItem, NewOrder},
            money::{format_amount, to_minor_units},
            promo::apply_promo,
        },
        entities::PaymentMethod,
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use tracing::{info, instrument};

    /// Discord IDs fit in 63 bits, so this only fails on corrupt input.
    fn customer_id(user: &serenity::User) -> Result<i64> {
        i64::try_from(user.id.get()).map_err(|_| {
            Error::validation(format!("user ID {} does not fit an order user ID", user.id))
        })
    }

    /// Parses `12x2, 7` into items; a missing quantity means one.
    fn parse_items(list: &str) -> Result<Vec<NewItem>> {
        list.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (product, quantity) = entry.split_once(['x', 'X', '*']).unwrap_or((entry, "1"));
                match (product.trim().parse(), quantity.trim().parse()) {
                    (Ok(product_id), Ok(quantity)) => Ok(NewItem {
                        product_id,
                        quantity,
                    }),
                    _ => Err(Error::InvalidOrder {
                        message: format!("'{entry}' is not a product ID and quantity like 12x2"),
                    }),
                }
            })
            .collect()
    }

    fn payment_method(online: Option<bool>) -> PaymentMethod {
        if online.unwrap_or(false) {
            PaymentMethod::Gateway
        } else {
            PaymentMethod::Cash
        }
    }

    /// Orders products from a store for delivery.
    #[poise::command(slash_command)]
    #[instrument(skip(ctx))]
    pub async fn order(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Products as ID x quantity, e.g. 12x2, 7"] items: String,
        #[description = "Where to deliver"] destination: String,
        #[description = "Promo code, applied when a branch is chosen"] promo_code: Option<String>,
        #[description = "Pay by cash (default) or online"] online: Option<bool>,
    ) -> Result<()> {
        let data = ctx.data();
        let order_id = dispatch::create_order(
            &data.database,
            &data.outbox,
            NewOrder {
                user_id: customer_id(ctx.author())?,
                fulfilment: Fulfilment::Store {
                    items: parse_items(&items)?,
                    delivery_address: destination,
                },
                payment_method: payment_method(online),
                courier_id: None,
                promo_code: promo_code.clone(),
            },
        )
        .await?;
        let order = dispatch::get_order(&data.database, order_id).await?;

        info!(order_id, "Store order placed via Discord");
        let mut reply = format!(
            "✅ Order #{order_id} created ({}). Couriers have been notified.",
            format_amount(order.total)
        );
        if let Some(code) = promo_code.filter(|code| !code.trim().is_empty()) {
            reply.push_str(&format!("\nPromo {} will be applied when a branch is chosen.", code.trim()));
        }
        ctx.say(reply).await?;
        Ok(())
    }

    /// Shows what a promo code would take off an order. Nothing is redeemed.
    #[poise::command(slash_command, ephemeral)]
    pub async fn promo(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Promo code"] code: String,
        #[description = "Products as ID x quantity, e.g. 12x2, 7"] items: String,
    ) -> Result<()> {
        let items = parse_items(&items)?;
        dispatch::validate_items(&items)?;

        let db = &ctx.data().database;
        let total = dispatch::price_items(db, &items).await?;
        let product_ids: Vec<i64> = items.iter().map(|item| item.product_id).collect();
        let discounted =
            apply_promo(db, code.trim(), customer_id(ctx.author())?, total, &product_ids)
                .await?;

        ctx.say(format!(
            "Code {}: {} → {}",
            code.trim(),
            format_amount(total),
            format_amount(discounted)
        ))
        .await?;
        Ok(())
    }

    /// Requests a courier to carry something from one address to another.
    #[poise::command(slash_command)]
    #[instrument(skip(ctx))]
    pub async fn deliver(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Where the courier picks up"] pickup: String,
        #[description = "Where the courier delivers"] destination: String,
        #[description = "Delivery price"] price: f64,
        #[description = "Note for the courier"] comment: Option<String>,
        #[description = "Pay by cash (default) or online"] online: Option<bool>,
    ) -> Result<()> {
        let Some(delivery_price) = to_minor_units(price) else {
            ctx.say("❌ Invalid price: must be a non-negative number").await?;
            return Ok(());
        };

        let data = ctx.data();
        let order_id = dispatch::create_order(
            &data.database,
            &data.outbox,
            NewOrder {
                user_id: customer_id(ctx.author())?,
                fulfilment: Fulfilment::Courier {
                    pickup_address: pickup,
                    delivery_address: destination,
                    delivery_price,
                    comment,
                },
                payment_method: payment_method(online),
                courier_id: None,
                promo_code: None,
            },
        )
        .await?;

        info!(order_id, "Delivery requested via Discord");
        ctx.say(format!(
            "✅ Order #{order_id} created ({}). Couriers have been notified.",
            format_amount(delivery_price)
        ))
        .await?;
        Ok(())
    }

    /// Lists your recent orders.
    #[poise::command(slash_command, ephemeral)]
    pub async fn orders(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let orders =
            dispatch::list_orders_for_user(&ctx.data().database, customer_id(ctx.author())?)
                .await?;

        if orders.is_empty() {
            ctx.say("You have no orders yet.").await?;
            return Ok(());
        }

        let mut response = String::from("**Your orders**\n");
        for order in orders {
            response.push_str(&format!(
                "• #{} - {} - {}{}\n",
                order.id,
                order.status,
                format_amount(order.amount_due()),
                if order.paid { " (paid)" } else { "" }
            ));
        }
        ctx.say(response).await?;
        Ok(())
    }

    /// Gets a payment link for one of your orders.
    #[poise::command(slash_command, ephemeral)]
    pub async fn pay(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Order number"] order_id: i64,
    ) -> Result<()> {
        let data = ctx.data();
        let session = data
            .payments
            .start_payment(&data.database, order_id, customer_id(ctx.author())?)
            .await?;

        ctx.say(format!(
            "Pay for order #{order_id} here: {}",
            session.redirect_url
        ))
        .await?;
        Ok(())
    }

    /// Checks whether the payment for one of your orders went through.
    #[poise::command(slash_command, ephemeral)]
    pub async fn payment_status(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Order number"] order_id: i64,
    ) -> Result<()> {
        let data = ctx.data();
        let order = dispatch::get_order(&data.database, order_id).await?;
        if order.user_id != customer_id(ctx.author())? {
            return Err(Error::not_found("order", order_id));
        }

        let reply = if data.payments.settle(&data.database, order_id).await? {
            format!("✅ Order #{order_id} is paid.")
        } else {
            format!("⏳ Payment for order #{order_id} has not gone through yet.")
        };
        ctx.say(reply).await?;
        Ok(())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_items() {
            let items = parse_items(" 12x2, 7 ,3*4").ok();
            assert_eq!(
                items,
                Some(vec![
                    NewItem {
                        product_id: 12,
                        quantity: 2
                    },
                    NewItem {
                        product_id: 7,
                        quantity: 1
                    },
                    NewItem {
                        product_id: 3,
                        quantity: 4
                    },
                ])
            );
            assert_eq!(parse_items("").ok(), Some(Vec::new()));
            assert!(matches!(
                parse_items("bun x2"),
                Err(Error::InvalidOrder { .. })
            ));
        }
    }
}

pub use inner::*;
