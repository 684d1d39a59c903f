//! Button handler - turns a pressed action token into an engine call.
//!
//! The presser is identified by their Discord user ID, which must be linked to a
//! courier via `/register`. Every outcome, including a lost claim race, is
//! answered with an ephemeral reply.

use crate::{
    bot::BotData,
    core::{
        catalog::get_courier_by_handle,
        dispatch::{ClaimOutcome, claim_order, complete_order, select_branch},
        money::format_amount,
    },
    errors::{Error, Result},
    notify::{ActionToken, Outbox},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

/// Runs the engine operation named by `token` for the courier linked to `handle`.
///
/// Returns the text to show the courier.
pub async fn dispatch_action(
    db: &DatabaseConnection,
    outbox: &Outbox,
    handle: &str,
    token: ActionToken,
) -> Result<String> {
    let courier = get_courier_by_handle(db, handle)
        .await?
        .ok_or_else(|| Error::not_found("courier", handle))?;

    let reply = match token {
        ActionToken::Claim { order_id } => {
            match claim_order(db, outbox, order_id, courier.id).await? {
                ClaimOutcome::Claimed(_) => format!("Order #{order_id} is yours."),
                ClaimOutcome::AlreadyClaimed { .. } => {
                    format!("Order #{order_id} has already been taken by another courier.")
                }
            }
        }
        ActionToken::SelectBranch {
            order_id,
            partner_id,
        } => {
            let receipt = select_branch(db, outbox, order_id, courier.id, partner_id).await?;
            format!(
                "Branch selected for order #{order_id}. Collect {} item(s), total {}.",
                receipt.lines.len(),
                format_amount(receipt.total)
            )
        }
        ActionToken::Complete { order_id } => {
            complete_order(db, outbox, order_id, courier.id).await?;
            format!("Order #{order_id} marked as delivered.")
        }
    };
    Ok(reply)
}

/// User-facing text for an error.
///
/// Internal failures get a generic message; the details go to the log.
#[must_use]
pub fn describe_error(error: &Error) -> String {
    match error {
        Error::NotFound {
            entity: "courier", ..
        } => "You are not registered as a courier. Use `/register` first.".to_string(),
        Error::Forbidden { order_id, .. } => {
            format!("Order #{order_id} is assigned to another courier.")
        }
        Error::NotFound { .. }
        | Error::InvalidState { .. }
        | Error::NoFulfillingBranch { .. }
        | Error::BranchCannotFulfil { .. }
        | Error::InvalidOrder { .. }
        | Error::Validation { .. }
        | Error::Promo(_)
        | Error::Gateway(_) => format!("❌ {error}"),
        Error::Config { .. }
        | Error::Database(_)
        | Error::Io(_)
        | Error::EnvVar(_)
        | Error::Framework(_) => "Something went wrong. Please try again later.".to_string(),
    }
}

/// Handles framework events; only component interactions are of interest.
pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &BotData,
) -> Result<()> {
    let serenity::FullEvent::InteractionCreate {
        interaction: serenity::Interaction::Component(component),
    } = event
    else {
        return Ok(());
    };

    let custom_id = component.data.custom_id.as_str();
    let token = match custom_id.parse::<ActionToken>() {
        Ok(token) => token,
        Err(e) => {
            warn!(custom_id, "Ignoring unknown button: {e}");
            return Ok(());
        }
    };

    let handle = component.user.id.to_string();
    info!(%token, handle, "Button pressed");

    let reply = match dispatch_action(&data.database, &data.outbox, &handle, token).await {
        Ok(reply) => reply,
        Err(e) => {
            if matches!(
                e,
                Error::Database(_) | Error::Io(_) | Error::Framework(_) | Error::Config { .. }
            ) {
                error!(%token, "Button action failed: {e}");
            }
            describe_error(&e)
        }
    };

    component
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(reply)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::{Fulfilment, NewOrder, create_order, get_order};
    use crate::entities::{OrderStatus, PaymentMethod};
    use crate::test_utils::*;

    async fn courier_order(db: &DatabaseConnection, outbox: &Outbox) -> Result<i64> {
        create_order(
            db,
            outbox,
            NewOrder {
                user_id: 9,
                fulfilment: Fulfilment::Courier {
                    pickup_address: "Manas 10".to_string(),
                    delivery_address: "Toktogul 5".to_string(),
                    delivery_price: 300,
                    comment: None,
                },
                payment_method: PaymentMethod::Cash,
                courier_id: None,
                promo_code: None,
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_buttons_drive_the_order() -> Result<()> {
        let db = setup_test_db().await?;
        let (outbox, _rx) = test_outbox();
        create_test_courier(&db, "1001", Some("111")).await?;
        create_test_courier(&db, "1002", Some("222")).await?;
        let order_id = courier_order(&db, &outbox).await?;

        let reply = dispatch_action(&db, &outbox, "111", ActionToken::Claim { order_id }).await?;
        assert_eq!(reply, format!("Order #{order_id} is yours."));

        let reply = dispatch_action(&db, &outbox, "222", ActionToken::Claim { order_id }).await?;
        assert!(reply.contains("already been taken"));

        let err = dispatch_action(&db, &outbox, "222", ActionToken::Complete { order_id })
            .await
            .unwrap_err();
        assert_eq!(
            describe_error(&err),
            format!("Order #{order_id} is assigned to another courier.")
        );

        dispatch_action(&db, &outbox, "111", ActionToken::Complete { order_id }).await?;
        assert_eq!(get_order(&db, order_id).await?.status, OrderStatus::Delivered);
        Ok(())
    }

    #[tokio::test]
    async fn test_unlinked_presser_is_told_to_register() -> Result<()> {
        let db = setup_test_db().await?;
        let (outbox, _rx) = test_outbox();

        let err = dispatch_action(&db, &outbox, "999", ActionToken::Claim { order_id: 1 })
            .await
            .unwrap_err();
        assert!(describe_error(&err).contains("/register"));
        Ok(())
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let err = Error::Config {
            message: "secret path /etc/x".to_string(),
        };
        assert!(!describe_error(&err).contains("/etc/x"));
    }

    #[test]
    fn test_input_errors_are_shown() {
        let err = Error::validation("Product price cannot be negative: -1");
        assert!(describe_error(&err).contains("price cannot be negative"));
    }
}
