//! Payment sessions and the settlement flow built on the gateway client.
//!
//! Sessions live in memory only. One is opened per order by [`PaymentService::start_payment`],
//! updated by every status poll, and dropped once the order is paid.

use super::client::{GatewayClient, GatewayStatus, SessionInit, SignedRequest};
use crate::{
    core::dispatch::{PAYMENT_SUCCESS, get_order, mark_paid},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument};

/// An open payment session for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentSession {
    /// Order being paid
    pub order_id: i64,
    /// Gateway-assigned session ID, if any
    pub session_id: Option<String>,
    /// Where the customer completes the payment
    pub redirect_url: String,
    /// The signed request that opened the session
    pub request: SignedRequest,
    /// Result of the most recent status poll
    pub last_status: Option<GatewayStatus>,
    /// When the session was opened or last polled
    pub updated_at: DateTime<Utc>,
}

impl PaymentSession {
    fn opened(order_id: i64, init: SessionInit) -> Self {
        Self {
            order_id,
            session_id: init.session_id,
            redirect_url: init.redirect_url,
            request: init.request,
            last_status: None,
            updated_at: Utc::now(),
        }
    }
}

/// Shared map of open sessions keyed by order ID.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<i64, PaymentSession>>>,
}

impl SessionRegistry {
    /// Stores `session`, replacing any earlier session for the same order.
    pub async fn insert(&self, session: PaymentSession) {
        self.sessions.write().await.insert(session.order_id, session);
    }

    /// A copy of the session for `order_id`.
    pub async fn get(&self, order_id: i64) -> Option<PaymentSession> {
        self.sessions.read().await.get(&order_id).cloned()
    }

    /// Records a poll result on the session, if one is open.
    pub async fn record_status(&self, order_id: i64, status: GatewayStatus) {
        if let Some(session) = self.sessions.write().await.get_mut(&order_id) {
            session.last_status = Some(status);
            session.updated_at = Utc::now();
        }
    }

    /// Discards the session for `order_id`.
    pub async fn remove(&self, order_id: i64) -> Option<PaymentSession> {
        self.sessions.write().await.remove(&order_id)
    }

    /// Number of open sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is open.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Opens payment sessions and reconciles their outcome with orders.
#[derive(Debug, Clone)]
pub struct PaymentService {
    client: GatewayClient,
    sessions: SessionRegistry,
}

impl PaymentService {
    /// Creates a service around `client` with no open sessions.
    #[must_use]
    pub fn new(client: GatewayClient) -> Self {
        Self {
            client,
            sessions: SessionRegistry::default(),
        }
    }

    /// Open sessions.
    #[must_use]
    pub const fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Opens a gateway session for the amount still due on the user's order.
    ///
    /// Orders of other users are reported as not found. Paid orders are rejected.
    #[instrument(skip(self, db))]
    pub async fn start_payment(
        &self,
        db: &DatabaseConnection,
        order_id: i64,
        user_id: i64,
    ) -> Result<PaymentSession> {
        let order = get_order(db, order_id).await?;
        if order.user_id != user_id {
            return Err(Error::not_found("order", order_id));
        }
        if order.paid {
            return Err(Error::invalid_state(order_id, "order is already paid"));
        }

        let init = self.client.create_session(order_id, order.amount_due()).await?;
        let session = PaymentSession::opened(order_id, init);
        self.sessions.insert(session.clone()).await;

        info!(order_id, user_id, "Payment session started");
        Ok(session)
    }

    /// Polls the gateway and records the result on the open session.
    pub async fn refresh_status(&self, order_id: i64) -> Result<GatewayStatus> {
        let status = self.client.poll_status(&order_id.to_string()).await?;
        self.sessions.record_status(order_id, status.clone()).await;
        Ok(status)
    }

    /// Polls the gateway and marks the order paid when the payment succeeded.
    ///
    /// Returns whether the order is paid afterwards. A gateway failure leaves the
    /// order untouched.
    #[instrument(skip(self, db))]
    pub async fn settle(&self, db: &DatabaseConnection, order_id: i64) -> Result<bool> {
        if get_order(db, order_id).await?.paid {
            self.sessions.remove(order_id).await;
            return Ok(true);
        }

        let status = self.refresh_status(order_id).await?;
        if !status.is_ok() {
            return Ok(false);
        }
        mark_paid(db, order_id, &status.payment_status).await?;

        let paid = status.payment_status == PAYMENT_SUCCESS;
        if paid {
            self.sessions.remove(order_id).await;
        }
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::settings::GatewayConfig;
    use crate::core::dispatch::{Fulfilment, NewItem, NewOrder, create_order};
    use crate::entities::PaymentMethod;
    use crate::errors::GatewayError;
    use crate::test_utils::*;
    use axum::{Router, routing::post};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    async fn spawn_gateway(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn service_for(base: &str) -> PaymentService {
        let client = GatewayClient::new(GatewayConfig {
            merchant_id: "560521".to_string(),
            secret_key: "secret".to_string(),
            init_url: format!("{base}/init_payment.php"),
            status_url: format!("{base}/g2g/status_v2"),
            timeout_secs: 1,
        })
        .unwrap();
        PaymentService::new(client)
    }

    /// A gateway that reports `pending` until `settled` is set.
    fn fake_gateway(settled: Arc<AtomicBool>) -> Router {
        Router::new()
            .route(
                "/init_payment.php",
                post(|| async {
                    "<response><pg_status>ok</pg_status><pg_payment_id>77</pg_payment_id>\
                     <pg_redirect_url>https://pay.example/s/77</pg_redirect_url></response>"
                }),
            )
            .route(
                "/g2g/status_v2",
                post(move || {
                    let settled = Arc::clone(&settled);
                    async move {
                        let state = if settled.load(Ordering::SeqCst) {
                            "success"
                        } else {
                            "pending"
                        };
                        format!(
                            "<response><pg_status>ok</pg_status>\
                             <pg_payment_status>{state}</pg_payment_status></response>"
                        )
                    }
                }),
            )
    }

    async fn gateway_order(db: &DatabaseConnection) -> Result<i64> {
        let (outbox, _rx) = test_outbox();
        let store = crate::core::catalog::create_store(db, "Shop").await?;
        let product = create_test_product(db, store.id, "Tea", 450).await?;
        create_order(
            db,
            &outbox,
            NewOrder {
                user_id: 5,
                fulfilment: Fulfilment::Store {
                    items: vec![NewItem {
                        product_id: product.id,
                        quantity: 2,
                    }],
                    delivery_address: "Chui Ave 1".to_string(),
                },
                payment_method: PaymentMethod::Gateway,
                courier_id: None,
                promo_code: None,
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_start_and_settle_payment() -> Result<()> {
        let db = setup_test_db().await?;
        let order_id = gateway_order(&db).await?;
        let settled = Arc::new(AtomicBool::new(false));
        let service = service_for(&spawn_gateway(fake_gateway(Arc::clone(&settled))).await);

        let session = service.start_payment(&db, order_id, 5).await?;
        assert_eq!(session.redirect_url, "https://pay.example/s/77");
        assert_eq!(session.request.get("pg_amount"), Some("9.00"));
        assert_eq!(service.sessions().len().await, 1);

        assert!(!service.settle(&db, order_id).await?);
        assert!(!get_order(&db, order_id).await?.paid);
        let open = service.sessions().get(order_id).await.unwrap();
        assert_eq!(open.last_status.unwrap().payment_status, "pending");

        settled.store(true, Ordering::SeqCst);
        assert!(service.settle(&db, order_id).await?);
        assert!(get_order(&db, order_id).await?.paid);
        assert!(service.sessions().is_empty().await);

        let again = service.start_payment(&db, order_id, 5).await;
        assert!(matches!(again, Err(Error::InvalidState { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_start_payment_hides_other_users_orders() -> Result<()> {
        let db = setup_test_db().await?;
        let order_id = gateway_order(&db).await?;
        let service = service_for(&spawn_gateway(fake_gateway(Arc::default())).await);

        let result = service.start_payment(&db, order_id, 6).await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
        assert!(service.sessions().is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_status_request_does_not_settle() -> Result<()> {
        let db = setup_test_db().await?;
        let order_id = gateway_order(&db).await?;
        let router = Router::new().route(
            "/g2g/status_v2",
            post(|| async {
                "<response><pg_status>error</pg_status>\
                 <pg_payment_status>success</pg_payment_status></response>"
            }),
        );
        let service = service_for(&spawn_gateway(router).await);

        assert!(!service.settle(&db, order_id).await?);
        assert!(!get_order(&db, order_id).await?.paid);
        assert_eq!(service.refresh_status(order_id).await?.status, "error");
        Ok(())
    }

    #[tokio::test]
    async fn test_poll_timeout_leaves_order_unchanged() -> Result<()> {
        let db = setup_test_db().await?;
        let order_id = gateway_order(&db).await?;
        let router = Router::new().route(
            "/g2g/status_v2",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "<response><pg_status>ok</pg_status>\
                 <pg_payment_status>success</pg_payment_status></response>"
            }),
        );
        let service = service_for(&spawn_gateway(router).await);
        let before = get_order(&db, order_id).await?;

        let err = service.settle(&db, order_id).await.unwrap_err();
        assert!(matches!(err, Error::Gateway(GatewayError::Unreachable(_))));
        assert!(err.is_retryable());
        assert_eq!(get_order(&db, order_id).await?, before);
        Ok(())
    }
}
