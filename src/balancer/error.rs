//! Facade errors.

use crate::networks::NetworkError;
use crate::rules::RuleError;
use crate::services::PoolError;
use crate::targets::TargetError;
use thiserror::Error;

/// Errors surfaced while composing or starting a load balancer.
#[derive(Debug, Error)]
pub enum BalancerError {
    /// A target group was registered without any targets.
    #[error("target group must contain at least one target")]
    NoTargetsInGroup,

    /// The configured load balancer type is not recognized.
    #[error("unknown load balancer type '{0}'")]
    UnknownType(String),

    /// A rule failed validation.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// A service could not be added to a pool.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A target could not be added to the network pool.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// A target could not be built.
    #[error(transparent)]
    Target(#[from] TargetError),

    /// The TLS certificate or key could not be used.
    #[error("invalid TLS configuration: {0}")]
    TlsConfig(String),

    /// Listener or file IO failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for facade operations.
pub type BalancerResult<T> = Result<T, BalancerError>;
