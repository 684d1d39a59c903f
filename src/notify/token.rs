//! Action tokens.
//!
//! Tokens are short strings so they fit in a chat button payload:
//! `claim:<order>`, `branch:<order>:<partner>` and `complete:<order>`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An action a recipient can trigger from a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionToken {
    /// Claim a waiting order
    Claim {
        /// Order to claim
        order_id: i64,
    },
    /// Pick the branch that fulfils a store order
    SelectBranch {
        /// Claimed order
        order_id: i64,
        /// Chosen partner
        partner_id: i64,
    },
    /// Mark a claimed order as delivered
    Complete {
        /// Claimed order
        order_id: i64,
    },
}

impl ActionToken {
    /// Order the token refers to.
    #[must_use]
    pub const fn order_id(&self) -> i64 {
        match self {
            Self::Claim { order_id }
            | Self::SelectBranch { order_id, .. }
            | Self::Complete { order_id } => *order_id,
        }
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Claim { order_id } => write!(f, "claim:{order_id}"),
            Self::SelectBranch {
                order_id,
                partner_id,
            } => write!(f, "branch:{order_id}:{partner_id}"),
            Self::Complete { order_id } => write!(f, "complete:{order_id}"),
        }
    }
}

/// The string is not a token this engine issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised action token `{0}`")]
pub struct ParseTokenError(pub String);

impl FromStr for ActionToken {
    type Err = ParseTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseTokenError(s.to_string());
        let parse_id = |part: &str| part.parse::<i64>().map_err(|_| invalid());

        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            ["claim", order] => Ok(Self::Claim {
                order_id: parse_id(order)?,
            }),
            ["branch", order, partner] => Ok(Self::SelectBranch {
                order_id: parse_id(order)?,
                partner_id: parse_id(partner)?,
            }),
            ["complete", order] => Ok(Self::Complete {
                order_id: parse_id(order)?,
            }),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_token_wire_format() {
        assert_eq!(ActionToken::Claim { order_id: 12 }.to_string(), "claim:12");
        assert_eq!(
            ActionToken::SelectBranch {
                order_id: 12,
                partner_id: 3
            }
            .to_string(),
            "branch:12:3"
        );
        assert_eq!(
            "complete:7".parse::<ActionToken>().unwrap(),
            ActionToken::Complete { order_id: 7 }
        );
        assert_eq!(
            "branch:12:3".parse::<ActionToken>().unwrap().order_id(),
            12
        );
    }

    #[test]
    fn test_rejects_foreign_tokens() {
        for raw in ["", "claim", "claim:", "claim:abc", "take_12", "branch:1", "complete:1:2"] {
            assert_eq!(
                raw.parse::<ActionToken>(),
                Err(ParseTokenError(raw.to_string())),
                "{raw} should not parse"
            );
        }
    }
}
