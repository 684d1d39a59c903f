//! Discord interaction handlers
//!
//! This module provides handlers for Discord interactions that are not slash
//! commands, currently the buttons attached to dispatch messages.

/// Button presses carrying action tokens
pub mod interaction;

pub use interaction::{describe_error, dispatch_action, handle_event};
