//! Shared test utilities for the dispatch engine.
//!
//! This module provides common helper functions for setting up test databases,
//! creating test records with sensible defaults, and capturing notifications.

use crate::{
    core::catalog::{self, NewPromoCode},
    entities,
    errors::Result,
    notify::{Action, Notification, Notifier, Outbox, RetryPolicy},
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
///
/// Every connection to `sqlite::memory:` opens its own database, so the pool is
/// held at exactly one connection.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// How many connections [`setup_file_db`] pools.
pub const FILE_DB_CONNECTIONS: u32 = 8;

/// Creates a file-backed `SQLite` database with a multi-connection pool.
///
/// Concurrency tests use this one: unlike [`setup_test_db`], its transactions run on
/// separate connections and really contend for the write lock. The database lives
/// as long as the returned directory.
pub async fn setup_file_db() -> Result<(Arc<DatabaseConnection>, TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("dispatch.sqlite").display());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(FILE_DB_CONNECTIONS)
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((Arc::new(db), dir))
}

/// Sets up a test database with one store.
/// Returns (db, store) for common test scenarios.
pub async fn setup_with_store() -> Result<(DatabaseConnection, entities::store::Model)> {
    let db = setup_test_db().await?;
    let store = catalog::create_store(&db, "Test Store").await?;
    Ok((db, store))
}

/// Creates a test courier, optionally already linked to a chat handle.
pub async fn create_test_courier(
    db: &DatabaseConnection,
    phone: &str,
    handle: Option<&str>,
) -> Result<entities::courier::Model> {
    let courier = catalog::create_courier(db, phone, Some("Test Courier".to_string())).await?;
    match handle {
        Some(handle) => match catalog::link_channel_handle(db, phone, handle).await? {
            Some(catalog::LinkedAccount::Courier(linked)) => Ok(linked),
            _ => Ok(courier),
        },
        None => Ok(courier),
    }
}

/// Creates a test partner named "Test Partner" without a chat handle.
pub async fn create_test_partner(
    db: &DatabaseConnection,
    address: &str,
    phone: &str,
) -> Result<entities::partner::Model> {
    catalog::create_partner(db, "Test Partner", address, phone).await
}

/// Creates a partner named "Test Branch" and links it to `store_id`.
pub async fn create_test_branch(
    db: &DatabaseConnection,
    store_id: i64,
    address: &str,
    phone: &str,
    handle: Option<&str>,
) -> Result<entities::partner::Model> {
    let partner = catalog::create_partner(db, "Test Branch", address, phone).await?;
    catalog::link_branch(db, store_id, partner.id).await?;
    match handle {
        Some(handle) => match catalog::link_channel_handle(db, phone, handle).await? {
            Some(catalog::LinkedAccount::Partner(linked)) => Ok(linked),
            _ => Ok(partner),
        },
        None => Ok(partner),
    }
}

/// Creates a test product with an empty description.
pub async fn create_test_product(
    db: &DatabaseConnection,
    store_id: i64,
    name: &str,
    price: i64,
) -> Result<entities::product::Model> {
    catalog::create_product(db, store_id, name, "", price).await
}

/// Creates a promo code valid from yesterday until tomorrow.
pub async fn create_test_promo(
    db: &DatabaseConnection,
    store_id: i64,
    code: &str,
    discount_amount: i64,
    min_order_sum: i64,
    usage_limit: Option<i32>,
    product_ids: Vec<i64>,
) -> Result<entities::promo_code::Model> {
    let now = Utc::now();
    catalog::create_promo_code(
        db,
        NewPromoCode {
            store_id,
            code: code.to_string(),
            discount_amount,
            min_order_sum,
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(1),
            usage_limit,
            product_ids,
        },
    )
    .await
}

/// Creates an unlimited promo code with a custom validity window.
pub async fn create_windowed_promo(
    db: &DatabaseConnection,
    store_id: i64,
    code: &str,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
) -> Result<entities::promo_code::Model> {
    catalog::create_promo_code(
        db,
        NewPromoCode {
            store_id,
            code: code.to_string(),
            discount_amount: 100,
            min_order_sum: 0,
            valid_from,
            valid_until,
            usage_limit: None,
            product_ids: Vec::new(),
        },
    )
    .await
}

/// Notifier that forwards every notification into a channel.
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, channel: &str, text: &str, actions: &[Action]) -> Result<()> {
        let notification = Notification {
            channel: channel.to_string(),
            text: text.to_string(),
            actions: actions.to_vec(),
        };
        // A dropped receiver just means the test does not care
        let _ = self.sender.send(notification);
        Ok(())
    }
}

/// An outbox whose deliveries can be read from the returned receiver.
pub fn test_outbox() -> (Outbox, mpsc::UnboundedReceiver<Notification>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let policy = RetryPolicy {
        attempts: 1,
        backoff: std::time::Duration::from_millis(1),
    };
    (
        Outbox::new(Arc::new(ChannelNotifier { sender }), policy),
        receiver,
    )
}

const DELIVERY_WAIT: std::time::Duration = std::time::Duration::from_millis(500);

/// Waits for the next delivered notification.
///
/// # Panics
/// Panics if nothing arrives in time.
#[allow(clippy::panic)]
pub async fn next_notification(rx: &mut mpsc::UnboundedReceiver<Notification>) -> Notification {
    match tokio::time::timeout(DELIVERY_WAIT, rx.recv()).await {
        Ok(Some(notification)) => notification,
        _ => panic!("expected a notification"),
    }
}

/// Asserts that no further notification is delivered.
///
/// # Panics
/// Panics if one arrives.
#[allow(clippy::panic)]
pub async fn assert_no_notification(rx: &mut mpsc::UnboundedReceiver<Notification>) {
    let wait = std::time::Duration::from_millis(50);
    if let Ok(Some(notification)) = tokio::time::timeout(wait, rx.recv()).await {
        panic!("unexpected notification: {notification:?}");
    }
}

/// Collects every notification delivered until the outbox goes quiet.
pub async fn drain_notifications(
    rx: &mut mpsc::UnboundedReceiver<Notification>,
) -> Vec<Notification> {
    let wait = std::time::Duration::from_millis(50);
    let mut drained = Vec::new();
    while let Ok(Some(notification)) = tokio::time::timeout(wait, rx.recv()).await {
        drained.push(notification);
    }
    drained
}
