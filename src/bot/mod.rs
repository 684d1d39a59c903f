//! Bot layer - Discord-specific interface and command handlers
//!
//! This module connects the dispatch engine to Discord: slash commands for
//! customers and couriers, a [`Notifier`](crate::notify::Notifier) that delivers
//! engine messages as DMs with buttons, and the handler that turns button presses
//! back into engine calls.

/// Discord command implementations (account, orders, general)
pub mod commands;
/// Discord interaction handlers (button presses)
pub mod handlers;
/// Direct-message delivery of engine notifications
pub mod notifier;

use crate::{errors::Error, notify::Outbox, payment::PaymentService};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use tracing::{error, info, instrument};

pub use notifier::DiscordNotifier;

/// Shared data available to all bot commands.
/// This structure holds the database connection, the notification outbox and
/// the payment service that commands need to access.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Where engine notifications are queued
    pub outbox: Outbox,
    /// Payment gateway sessions
    pub payments: PaymentService,
}

impl BotData {
    /// Creates a new `BotData` instance.
    /// This is typically called during bot initialization to set up the
    /// shared context for all commands.
    #[must_use]
    pub const fn new(database: DatabaseConnection, outbox: Outbox, payments: PaymentService) -> Self {
        Self {
            database,
            outbox,
            payments,
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error);
            if let Err(e) = ctx.say(handlers::describe_error(&error)).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Registers the slash commands and runs the Discord client until it stops.
#[instrument(skip(token, data))]
pub async fn run_bot(token: String, data: BotData) -> Result<(), Error> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::ping(),
                commands::help(),
                commands::register(),
                commands::order(),
                commands::deliver(),
                commands::promo(),
                commands::orders(),
                commands::pay(),
                commands::payment_status(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(handlers::handle_event(ctx, event, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged();

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}
