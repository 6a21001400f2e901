//! Network pool errors.

use thiserror::Error;

/// Errors surfaced while adding targets to a network pool.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The target's protocol maps to no supported transport.
    #[error("protocol not supported")]
    UnsupportedProtocol,

    /// The target has no host value.
    #[error("target is missing host value")]
    MissingHost,

    /// The target has no port value.
    #[error("target is missing port value")]
    MissingPort,
}

/// Result type for network pool operations.
pub type NetworkResult<T> = Result<T, NetworkError>;
