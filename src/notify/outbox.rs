//! Fire-and-forget notification delivery.
//!
//! [`Outbox::send`] returns immediately; the batch is delivered on a spawned task
//! so a slow or failing chat transport never holds up the request that produced
//! it. Each notification is retried with exponential backoff and dropped with an
//! error log once the attempts run out.

use super::{Notification, Notifier};
use crate::config::settings::DispatchConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// How hard to try delivering one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub attempts: u32,
    /// Delay before the first retry
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        DispatchConfig::default().into()
    }
}

impl From<DispatchConfig> for RetryPolicy {
    fn from(config: DispatchConfig) -> Self {
        Self {
            attempts: config.notify_attempts.max(1),
            backoff: Duration::from_millis(config.notify_backoff_ms),
        }
    }
}

/// Hands notification batches to a background task.
#[derive(Clone)]
pub struct Outbox {
    notifier: Arc<dyn Notifier>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Outbox {
    /// Creates an outbox delivering through `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    /// Queues `batch` for delivery and returns without waiting.
    ///
    /// The returned handle may be dropped; it is only useful for callers that
    /// want to wait for delivery, such as tests or a graceful shutdown.
    pub fn send(&self, batch: Vec<Notification>) -> Option<JoinHandle<()>> {
        if batch.is_empty() {
            return None;
        }

        let notifier = Arc::clone(&self.notifier);
        let policy = self.policy;
        Some(tokio::spawn(async move {
            for notification in batch {
                deliver(notifier.as_ref(), policy, &notification).await;
            }
        }))
    }
}

async fn deliver(notifier: &dyn Notifier, policy: RetryPolicy, notification: &Notification) {
    let mut delay = policy.backoff;
    for attempt in 1..=policy.attempts {
        match notifier
            .notify(
                &notification.channel,
                &notification.text,
                &notification.actions,
            )
            .await
        {
            Ok(()) => {
                debug!(channel = %notification.channel, attempt, "Notification delivered");
                return;
            }
            Err(e) if attempt < policy.attempts => {
                warn!(
                    channel = %notification.channel,
                    attempt,
                    "Notification failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => {
                error!(
                    channel = %notification.channel,
                    attempts = policy.attempts,
                    "Dropping notification: {e}"
                );
            }
        }
    }
}
