//! Target construction errors.

use thiserror::Error;

/// Errors surfaced while building targets.
#[derive(Debug, Error)]
pub enum TargetError {
    /// A service target URL could not be parsed into scheme and authority.
    #[error("invalid target URL '{url}': {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// What was wrong with it.
        message: String,
    },

    /// The target has no protocol to derive a transport or port from.
    #[error("target is missing protocol")]
    MissingProtocol,
}

/// Result type for target operations.
pub type TargetResult<T> = Result<T, TargetError>;
