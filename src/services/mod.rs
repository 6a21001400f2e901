//! The application-mode (HTTP) service pool.
//!
//! Requests are balanced across backend services with round-robin selection,
//! rate limited per client IP, retried in place on failure, and failed over
//! to the next alive service once the retry budget runs out.

mod error;
mod pool;
mod proxy;

pub use error::{PoolError, PoolResult};
pub use pool::{
    Service, ServicePool, HEALTH_PROBE_TIMEOUT, SERVICE_MAX_ATTEMPTS, SERVICE_MAX_RETRIES,
    SERVICE_RETRY_INTERVAL,
};
pub use proxy::HttpReverseProxy;
