use courier_dispatch::{
    bot::{self, BotData, DiscordNotifier},
    config::{database, settings},
    errors::{Error, Result},
    notify::Outbox,
    payment::{GatewayClient, PaymentService},
};
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load settings from config.toml plus environment overrides
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;
    info!(gateway = ?settings.gateway, "Settings loaded.");

    // 4. Connect and make sure every table exists
    let db = database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. DISCORD_BOT_TOKEN is loaded directly before use, not stored in Settings
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    // 6. Wire the notification outbox and the payment gateway
    let notifier = DiscordNotifier::new(Arc::new(serenity::Http::new(&token)));
    let outbox = Outbox::new(Arc::new(notifier), settings.dispatch.into());
    let payments = PaymentService::new(GatewayClient::new(settings.gateway.clone())?);

    // 7. Run the bot
    bot::run_bot(token, BotData::new(db, outbox, payments)).await?;

    Ok(())
}
