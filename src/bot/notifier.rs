//! Delivers engine notifications as Discord direct messages.
//!
//! A channel handle is the recipient's Discord user ID. Actions become buttons
//! whose custom ID is the action token, so a press arrives back in
//! [`handle_event`](super::handlers::handle_event) ready to parse.

use crate::{
    errors::{Error, Result},
    notify::{Action, Notifier},
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{debug, warn};

/// Discord allows at most five buttons per row.
const BUTTONS_PER_ROW: usize = 5;

/// [`Notifier`] backed by the Discord HTTP API.
#[derive(Clone)]
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    /// Creates a notifier that sends with `http`.
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }
}

/// Lays actions out as button rows.
#[must_use]
pub fn action_rows(actions: &[Action]) -> Vec<serenity::CreateActionRow> {
    actions
        .chunks(BUTTONS_PER_ROW)
        .map(|chunk| {
            serenity::CreateActionRow::Buttons(
                chunk
                    .iter()
                    .map(|action| {
                        serenity::CreateButton::new(action.token.to_string())
                            .label(action.label.clone())
                            .style(serenity::ButtonStyle::Primary)
                    })
                    .collect(),
            )
        })
        .collect()
}

/// Parses a channel handle into the Discord user it addresses.
pub fn parse_handle(channel: &str) -> Result<serenity::UserId> {
    channel
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(serenity::UserId::new)
        .ok_or_else(|| Error::validation(format!("'{channel}' is not a Discord user ID")))
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, channel: &str, text: &str, actions: &[Action]) -> Result<()> {
        // A handle that is not a Discord ID is never deliverable
        let user = match parse_handle(channel) {
            Ok(user) => user,
            Err(e) => {
                warn!("Dropping message to unreachable channel: {e}");
                return Ok(());
            }
        };
        let dm = user.create_dm_channel(self.http.as_ref()).await?;

        let mut message = serenity::CreateMessage::new().content(text);
        if !actions.is_empty() {
            message = message.components(action_rows(actions));
        }
        dm.id.send_message(self.http.as_ref(), message).await?;

        debug!(%user, buttons = actions.len(), "Sent direct message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ActionToken;

    #[test]
    fn test_buttons_wrap_after_five() {
        let actions: Vec<Action> = (1..=7)
            .map(|partner_id| {
                Action::new(
                    format!("Branch {partner_id}"),
                    ActionToken::SelectBranch {
                        order_id: 1,
                        partner_id,
                    },
                )
            })
            .collect();

        assert_eq!(action_rows(&actions).len(), 2);
        assert_eq!(action_rows(&actions[..5]).len(), 1);
        assert!(action_rows(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_non_discord_handle_is_dropped_without_error() {
        let notifier = DiscordNotifier::new(Arc::new(serenity::Http::new("")));
        let take = Action::new("Take order", ActionToken::Claim { order_id: 1 });
        let sent = notifier.notify("alice", "New order", &[take]).await;
        assert!(sent.is_ok());
    }

    #[test]
    fn test_parse_handle() {
        assert_eq!(
            parse_handle("80351110224678912").ok(),
            Some(serenity::UserId::new(80_351_110_224_678_912))
        );
        assert!(parse_handle("0").is_err());
        assert!(parse_handle("alice").is_err());
    }
}
