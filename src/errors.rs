//! Unified error types for the dispatch engine.
//!
//! Lost claim races are not errors (see `core::dispatch::ClaimOutcome`). Promo
//! ineligibility and gateway failures are errors, but expected ones: callers match
//! on [`Error::Promo`] and [`Error::Gateway`] to decide what to tell the user.

use thiserror::Error;

/// Why a promo code cannot be applied to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PromoRejection {
    /// The order total is below the code's minimum order sum
    #[error("order total is below the promo minimum of {minimum}")]
    BelowMinimum {
        /// Required minimum in minor units
        minimum: i64,
    },

    /// Outside the validity window, or the usage limit is reached
    #[error("promo code is not active")]
    Inactive,

    /// The user has already redeemed this code
    #[error("promo code already used by this user")]
    AlreadyUsed,

    /// The code is restricted to products that are not in the order
    #[error("promo code does not apply to any product in the order")]
    NotApplicable,
}

/// Failures talking to the external payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure, timeout or non-success HTTP status; safe to retry
    #[error("payment gateway unreachable: {0}")]
    Unreachable(String),

    /// The gateway answered with a body we could not use
    #[error("bad response from payment gateway: {0}")]
    BadResponse(String),

    /// The gateway refused the request
    #[error("payment declined: {0}")]
    Declined(String),

    /// A required request parameter was empty
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown ID or code
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// The ID or code that was not found
        id: String,
    },

    /// The actor may not perform this transition
    #[error("courier {courier_id} is not assigned to order {order_id}")]
    Forbidden {
        /// Order being acted on
        order_id: i64,
        /// Courier that attempted the action
        courier_id: i64,
    },

    /// The operation is not valid in the order's current state
    #[error("order {order_id}: {reason}")]
    InvalidState {
        /// Order being acted on
        order_id: i64,
        /// What is wrong with the current state
        reason: String,
    },

    /// No single partner can fulfil every item of the order
    #[error("no single branch can fulfil order {order_id}")]
    NoFulfillingBranch {
        /// Order being acted on
        order_id: i64,
    },

    /// The chosen partner cannot fulfil every item of the order
    #[error("partner {partner_id} cannot fulfil order {order_id}")]
    BranchCannotFulfil {
        /// Order being acted on
        order_id: i64,
        /// Partner that was chosen
        partner_id: i64,
    },

    /// The order request itself is malformed
    #[error("invalid order: {message}")]
    InvalidOrder {
        /// Description of the problem
        message: String,
    },

    /// A catalog record was given unusable input
    #[error("invalid input: {message}")]
    Validation {
        /// Description of the problem
        message: String,
    },

    /// Promo code cannot be applied
    #[error(transparent)]
    Promo(#[from] PromoRejection),

    /// Payment gateway failure
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or unreadable environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Chat framework error
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::InvalidState`].
    pub fn invalid_state(order_id: i64, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            order_id,
            reason: reason.into(),
        }
    }

    /// Whether repeating the same request later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Gateway(GatewayError::Unreachable(_)))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_gateway_is_retryable() {
        assert!(Error::Gateway(GatewayError::Unreachable("timeout".into())).is_retryable());
        assert!(!Error::Gateway(GatewayError::BadResponse("junk".into())).is_retryable());
        assert!(!Error::Gateway(GatewayError::Declined("no".into())).is_retryable());
        assert!(!Error::Promo(PromoRejection::Inactive).is_retryable());
        assert!(!Error::not_found("order", 1).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::not_found("order", 42).to_string(), "order 42 not found");
        assert_eq!(
            Error::Forbidden {
                order_id: 1,
                courier_id: 2
            }
            .to_string(),
            "courier 2 is not assigned to order 1"
        );
        assert_eq!(
            Error::from(PromoRejection::BelowMinimum { minimum: 1000 }).to_string(),
            "order total is below the promo minimum of 1000"
        );
    }
}
