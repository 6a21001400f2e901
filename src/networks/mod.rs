//! The network-mode (TCP) pool.
//!
//! Accepted connections are spliced to a round-robin-chosen backend. Dial
//! failures are retried against the same target, then failed over to the
//! next alive one; exhausting every target closes the client connection.

mod error;
mod pool;
mod proxy;

pub use error::{NetworkError, NetworkResult};
pub use pool::{NetworkPool, NetworkTarget, TARGET_MAX_ATTEMPTS, TARGET_MAX_RETRIES, TARGET_RETRY_INTERVAL};
pub use proxy::ReverseNetworkProxy;
