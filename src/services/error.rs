//! Service pool errors.

use thiserror::Error;

/// Errors surfaced while adding services to a pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The target could not be formatted as a proxy origin.
    #[error("invalid proxy origin '{origin}': {message}")]
    InvalidOrigin {
        /// The origin that failed to parse.
        origin: String,
        /// What was wrong with it.
        message: String,
    },

    /// The target has no host to build an origin from.
    #[error("target is missing host value")]
    MissingHost,
}

/// Result type for service pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
