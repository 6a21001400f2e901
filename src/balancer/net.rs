//! Network-mode facade.

use super::error::BalancerResult;
use crate::networks::NetworkPool;
use crate::shutdown::{ListenerHandle, StopHandle};
use crate::targets::{ResponseFormat, TargetGroup};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The network-mode load balancer: a single pool spliced onto a TCP
/// listener. Additional target groups append their targets to the same
/// pool.
#[derive(Debug)]
pub struct NetworkBalancer {
    pool: Arc<NetworkPool>,
    timeout: Duration,
    resp_format: ResponseFormat,
}

impl NetworkBalancer {
    /// Create a balancer with the given backend dial timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            pool: Arc::new(NetworkPool::new()),
            timeout,
            resp_format: ResponseFormat::default(),
        }
    }

    /// The balancer's pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<NetworkPool> {
        &self.pool
    }

    /// The configured error response format.
    #[must_use]
    pub fn err_response_format(&self) -> ResponseFormat {
        self.resp_format
    }

    /// Append a group's targets to the pool.
    pub fn add_target_group(&mut self, group: &TargetGroup) -> BalancerResult<()> {
        for target in group.targets() {
            target.set_err_response_format(self.resp_format);
            self.pool.add_target(Arc::clone(target), self.timeout)?;
        }
        Ok(())
    }

    /// Start passive health checking for the pool.
    #[must_use]
    pub fn health_check(&self, interval: Duration) -> StopHandle {
        self.pool.health_check(interval)
    }

    /// Start the TCP listener.
    pub async fn start(&self, laddr: &str) -> BalancerResult<ListenerHandle> {
        let handle = self.pool.load_balancer(laddr).await?;
        info!(addr = %handle.local_addr(), "network listener started");
        Ok(handle)
    }

    /// Set the error response format; unknown formats are ignored.
    pub fn set_err_response_format(&mut self, format: &str) {
        let parsed = ResponseFormat::parse(format);
        if parsed != ResponseFormat::Unknown {
            self.resp_format = parsed;
        }
    }

    /// TLS termination is not part of network mode; the setting is ignored.
    pub fn set_tls(&mut self, _cert_file: &str, _key_file: &str) {
        debug!("TLS setting ignored in network mode");
    }
}
