//! Discord command implementations organized by category.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Linking a Discord account to a courier or partner
pub mod account;

/// General utility commands
pub mod general;

/// Customer order and payment commands
pub mod orders;

// Export commands
pub use account::*;
pub use general::*;
pub use orders::*;
