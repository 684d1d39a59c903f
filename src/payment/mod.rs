//! Payment gateway integration (FreedomPay).
//!
//! [`GatewayClient`] speaks the signed wire protocol. [`PaymentService`] ties it to
//! orders: it opens sessions for the amount due and, when asked, settles orders
//! whose payment the gateway reports as successful. Nothing polls on its own.

/// Signed HTTP client for session init and status polling
pub mod client;
/// In-memory payment sessions and settlement
pub mod session;
/// `pg_sig` computation
pub mod signature;

pub use client::{GatewayClient, GatewayStatus, SessionInit, SignedRequest};
pub use session::{PaymentService, PaymentSession, SessionRegistry};
pub use signature::build_signature;
