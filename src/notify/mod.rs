//! Notification sink - how the engine reaches couriers and partners.
//!
//! The engine never talks to a chat transport directly. It builds [`Notification`]s
//! and hands them to an [`Outbox`], which delivers them through a [`Notifier`] on a
//! background task. Buttons on a message carry an [`ActionToken`] that comes back
//! into the engine when the recipient presses it.

/// Fire-and-forget delivery with retries
pub mod outbox;
/// Action tokens that round-trip through the chat transport
pub mod token;

use crate::errors::Result;
use async_trait::async_trait;

pub use outbox::{Outbox, RetryPolicy};
pub use token::{ActionToken, ParseTokenError};

/// A button attached to a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Text shown on the button
    pub label: String,
    /// What pressing the button does
    pub token: ActionToken,
}

impl Action {
    /// Creates an action with the given label.
    pub fn new(label: impl Into<String>, token: ActionToken) -> Self {
        Self {
            label: label.into(),
            token,
        }
    }
}

/// One message addressed to one chat handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Opaque chat handle of the recipient
    pub channel: String,
    /// Message body
    pub text: String,
    /// Buttons, possibly none
    pub actions: Vec<Action>,
}

impl Notification {
    /// A plain message without buttons.
    pub fn text(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            actions: Vec::new(),
        }
    }

    /// Adds a button to the message.
    #[must_use]
    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

/// A chat transport able to deliver notifications.
///
/// Implementations should return an error for anything worth retrying; the
/// [`Outbox`] decides how often to try again.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `text` with `actions` to the chat identified by `channel`.
    async fn notify(&self, channel: &str, text: &str, actions: &[Action]) -> Result<()>;
}
