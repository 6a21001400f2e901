//! # Switchyard
//!
//! A dual-mode load balancer fronting a set of backend services.
//!
//! ## Modes
//!
//! - **Application mode** routes HTTP(S) requests: each request is matched
//!   against an ordered list of listener rules, rate limited per client IP,
//!   and forwarded (or redirected) to a target group with round-robin
//!   selection, in-band retry and cross-target failover.
//! - **Network mode** splices raw TCP connections to round-robin-chosen
//!   backends with the same health and failover semantics.
//!
//! ## Modules
//!
//! - [`rules`]: condition parsing and request matching
//! - [`ratelimit`]: leaky-bucket limiter and the per-IP registry
//! - [`targets`]: the backend target model, probing and error rendering
//! - [`services`]: the application (HTTP) service pool
//! - [`networks`]: the network (TCP) pool and splicer
//! - [`balancer`]: mode facades and config composition
//! - [`config`]: configuration records and loader
//! - [`shutdown`]: stop handles and signal handling

pub mod balancer;
pub mod config;
pub mod networks;
pub mod ratelimit;
pub mod rules;
pub mod services;
pub mod shutdown;
pub mod targets;
