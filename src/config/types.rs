//! Configuration records.

use crate::rules::Condition;
use crate::targets::join_host_port;
use serde::{Deserialize, Serialize};

/// A load balancer target. Setting `url` overrides `host` and `port`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Hostname (IP or domain) of the targeted service.
    pub host: String,
    /// Port number of the targeted service.
    pub port: Option<u16>,
    /// URL of the targeted service; wins over host and port.
    pub url: String,
}

/// A listener rule: an action plus condition groups. Conditions are plain
/// `<key> <op> <value>` strings; the outer list is AND'd, each inner group
/// is OR'd.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// `forward` or `redirect`.
    pub action: String,
    /// Condition groups.
    pub conditions: Vec<Vec<Condition>>,
}

/// A named collection of targets routed by a shared rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetGroupConfig {
    /// Group name.
    pub name: String,
    /// Common group protocol.
    pub protocol: String,
    /// The group's routing rule (application mode).
    pub rule: RuleConfig,
    /// The group's targets.
    pub targets: Vec<TargetConfig>,
}

/// The main configuration record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Load balancer type: `app`/`application` or `net`/`network`.
    #[serde(rename = "type")]
    pub lb_type: String,
    /// Listener host.
    pub host: String,
    /// Listener port.
    pub port: u16,
    /// Listener transport; informational for application mode.
    pub protocol: String,
    /// Whether the listener serves TLS.
    pub tls_enabled: bool,
    /// TLS certificate file path.
    pub tls_cert_file: String,
    /// TLS private key file path.
    pub tls_key_file: String,
    /// Backend dial timeout in seconds (network mode).
    pub timeout: u64,
    /// Seconds per admitted request per client.
    pub request_rate: u64,
    /// Steps of burst a client may queue.
    pub request_rate_cap: i64,
    /// Passive health check interval in seconds.
    pub health_check_interval: u64,
    /// Error response format override: `html`, `json` or `plain`.
    pub resp_format: String,
    /// The configured target groups.
    pub target_groups: Vec<TargetGroupConfig>,
}

impl Config {
    /// The listener address as `host:port`.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_addr() {
        let config = Config {
            host: "0.0.0.0".to_owned(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.listen_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.lb_type.is_empty());
        assert!(!config.tls_enabled);
        assert!(config.target_groups.is_empty());
    }
}
