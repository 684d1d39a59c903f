//! HTTP client for the FreedomPay merchant API.
//!
//! Every request is form-encoded, salted and signed (see [`build_signature`]); every
//! response is an XML document that is checked before any field is used.

use super::signature::build_signature;
use crate::{
    config::settings::GatewayConfig,
    core::money::format_amount,
    errors::{Error, GatewayError, Result},
};
use rand::{Rng, distributions::Alphanumeric};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// Script name signed into session initialisation requests
pub const INIT_SCRIPT: &str = "init_payment.php";
/// Script name signed into status requests
pub const STATUS_SCRIPT: &str = "status_v2";

const SALT_LEN: usize = 16;
const STATUS_OK: &str = "ok";

/// A signed, ready-to-send parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Script the request was signed for
    pub script: &'static str,
    /// Form fields including `pg_sig`
    pub fields: Vec<(&'static str, String)>,
}

impl SignedRequest {
    fn new(script: &'static str, mut fields: Vec<(&'static str, String)>, secret: &str) -> Self {
        let signature = build_signature(
            script,
            fields.iter().map(|(key, value)| (*key, value.as_str())),
            secret,
        );
        fields.push(("pg_sig", signature));
        Self { script, fields }
    }

    /// Value of the field named `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A payment session opened on the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInit {
    /// Gateway-assigned session or payment ID, when the gateway returns one
    pub session_id: Option<String>,
    /// Page the customer pays on
    pub redirect_url: String,
    /// The request that opened the session
    pub request: SignedRequest,
}

/// Payment state reported by the gateway, as sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayStatus {
    /// Request status, `ok` on success
    pub status: String,
    /// Payment state, e.g. `pending`, `success` or `failed`; empty when not sent
    pub payment_status: String,
}

impl GatewayStatus {
    /// Whether the gateway accepted the status request.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Fields we read from gateway responses; everything else is ignored.
#[derive(Debug, Default, Deserialize)]
struct GatewayResponse {
    pg_status: Option<String>,
    pg_redirect_url: Option<String>,
    pg_session_id: Option<String>,
    pg_payment_id: Option<String>,
    pg_payment_status: Option<String>,
    pg_error_description: Option<String>,
}

impl GatewayResponse {
    fn parse(body: &str) -> std::result::Result<Self, GatewayError> {
        quick_xml::de::from_str(body).map_err(|e| {
            warn!("Unparseable gateway response: {e}");
            GatewayError::BadResponse(format!("invalid XML: {e}"))
        })
    }

    /// Fails with `Declined` unless `pg_status` is `ok`.
    fn ensure_ok(&self) -> std::result::Result<(), GatewayError> {
        match self.pg_status.as_deref().map(str::trim) {
            Some(STATUS_OK) => Ok(()),
            Some(_) => Err(GatewayError::Declined(
                self.pg_error_description
                    .clone()
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| "unknown error".to_string()),
            )),
            None => Err(missing_field("pg_status")),
        }
    }
}

fn missing_field(field: &str) -> GatewayError {
    warn!(field, "Gateway response is missing a required field");
    GatewayError::BadResponse(format!("missing {field}"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn generate_salt() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SALT_LEN)
        .map(char::from)
        .collect()
}

/// Signed-request client for the payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    http: Client,
}

impl GatewayClient {
    /// Creates a client with the configured request timeout.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self { config, http })
    }

    /// Opens a payment session for `amount` minor units.
    pub async fn create_session(
        &self,
        order_id: i64,
        amount: i64,
    ) -> std::result::Result<SessionInit, GatewayError> {
        let request = SignedRequest::new(
            INIT_SCRIPT,
            vec![
                ("pg_order_id", order_id.to_string()),
                ("pg_merchant_id", self.config.merchant_id.clone()),
                ("pg_amount", format_amount(amount)),
                ("pg_description", format!("Payment for order #{order_id}")),
                ("pg_salt", generate_salt()),
            ],
            &self.config.secret_key,
        );

        let body = self.post(&self.config.init_url, &request).await?;
        let response = GatewayResponse::parse(&body)?;
        response.ensure_ok()?;

        let redirect_url =
            non_empty(response.pg_redirect_url).ok_or_else(|| missing_field("pg_redirect_url"))?;
        let session_id = non_empty(response.pg_session_id).or(non_empty(response.pg_payment_id));

        debug!(order_id, ?session_id, "Payment session opened");
        Ok(SessionInit {
            session_id,
            redirect_url,
            request,
        })
    }

    /// Asks the gateway for the payment state of `order_id`.
    ///
    /// Both status strings are returned as the gateway sent them, including a
    /// non-`ok` request status. Nothing is written anywhere; deciding whether the
    /// order is paid is up to the caller.
    pub async fn poll_status(
        &self,
        order_id: &str,
    ) -> std::result::Result<GatewayStatus, GatewayError> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(GatewayError::MissingParameter("order_id"));
        }

        let request = SignedRequest::new(
            STATUS_SCRIPT,
            vec![
                ("pg_merchant_id", self.config.merchant_id.clone()),
                ("pg_order_id", order_id.to_string()),
                ("pg_salt", generate_salt()),
            ],
            &self.config.secret_key,
        );

        let body = self.post(&self.config.status_url, &request).await?;
        let response = GatewayResponse::parse(&body)?;

        let status = non_empty(response.pg_status).ok_or_else(|| missing_field("pg_status"))?;
        let payment_status = non_empty(response.pg_payment_status).unwrap_or_default();
        if status != STATUS_OK {
            debug!(
                order_id,
                %status,
                description = ?response.pg_error_description,
                "Gateway reported a non-ok status"
            );
        }

        Ok(GatewayStatus {
            status,
            payment_status,
        })
    }

    async fn post(
        &self,
        url: &str,
        request: &SignedRequest,
    ) -> std::result::Result<String, GatewayError> {
        debug!(script = request.script, "Calling payment gateway");

        let response = self
            .http
            .post(url)
            .form(&request.fields)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                warn!(script = request.script, "Payment gateway request failed: {e}");
                GatewayError::Unreachable(e.to_string())
            })?;

        response
            .text()
            .await
            .map_err(|e| GatewayError::Unreachable(e.to_string()))
    }
}
