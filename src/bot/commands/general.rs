//! General Discord commands - ping and help.
//! These commands don't touch the database.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let help_text = "**Courier Dispatch Help**\n\n\
        **Couriers and partners**\n\
        • `/register <phone>` - Links your Discord account to your courier or branch record.\n\
        New orders, branch choices and receipts then arrive as direct messages with buttons.\n\n\
        **Customers**\n\
        • `/order <items> <destination> [promo_code]` - Orders store products, e.g. `12x2, 7`.\n\
        • `/promo <code> <items>` - Shows what a promo code takes off, without using it.\n\
        • `/deliver <pickup> <destination> <price> [comment]` - Requests a courier delivery.\n\
        • `/orders` - Lists your recent orders.\n\
        • `/pay <order_id>` - Gets a payment link for an order.\n\
        • `/payment_status <order_id>` - Checks whether a payment went through.\n\n\
        **Utility**\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
