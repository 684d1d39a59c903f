//! Core business logic - framework-agnostic dispatch, promo and catalog operations.
//!
//! Everything here takes a database connection (and, where messages are produced,
//! an [`Outbox`](crate::notify::Outbox)) and knows nothing about the chat bot.

/// Couriers, partners, stores, products and promo code records
pub mod catalog;
/// Order lifecycle: create, claim, select branch, complete
pub mod dispatch;
/// Guarded conditional writes
pub mod guard;
/// Minor-unit money helpers
pub mod money;
/// Promo code eligibility and redemption
pub mod promo;
