//! Rule validation errors.

use thiserror::Error;

/// Errors surfaced while validating a listener rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule's action string did not name a known action.
    #[error("unknown rule action")]
    UnknownAction,

    /// A condition used a key that is not recognized.
    #[error("invalid rule condition - unknown key in '{condition}'")]
    InvalidKey {
        /// The offending condition string.
        condition: String,
    },

    /// A condition used an operator that is not recognized.
    #[error("invalid rule condition - unknown operator in '{condition}'")]
    InvalidOperator {
        /// The offending condition string.
        condition: String,
    },
}

/// Result type for rule operations.
pub type RuleResult<T> = Result<T, RuleError>;
