//! Account Discord commands - `register`.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        core::catalog::{self, LinkedAccount},
        errors::{Error, Result},
    };
    use tracing::info;

    /// Links your Discord account to the courier or branch registered under your phone.
    #[poise::command(slash_command, ephemeral)]
    pub async fn register(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Phone number you were registered with"] phone: String,
    ) -> Result<()> {
        let handle = ctx.author().id.to_string();
        info!("Register command received from user: {}", ctx.author().name);

        let reply = match catalog::link_channel_handle(&ctx.data().database, &phone, &handle)
            .await?
        {
            Some(LinkedAccount::Courier(courier)) => format!(
                "✅ Linked as courier {}. New orders will arrive here.",
                courier.display_name()
            ),
            Some(LinkedAccount::Partner(partner)) => format!(
                "✅ Linked as branch {} ({}). Receipts will arrive here.",
                partner.name, partner.address
            ),
            None => "❌ No courier or branch is registered with that phone number.".to_string(),
        };

        ctx.say(reply).await?;
        Ok(())
    }
}

pub use inner::*;
