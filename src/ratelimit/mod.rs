//! Per-client request rate limiting.
//!
//! Each client IP gets its own leaky-bucket limiter, held in a TTL-keyed
//! registry that forgets idle clients. The bucket tracks a single deadline:
//! each admitted request pushes it forward by the configured rate, and a
//! request is admitted only while the deadline stays within
//! `capacity x rate` of now.

mod limiter;
mod registry;

pub use limiter::{LeakyBucketLimiter, LeakyBucketState, LimitDecision};
pub use registry::IpRegistry;
