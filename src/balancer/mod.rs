//! Load balancer facades.
//!
//! The two operating modes are concrete variants of [`LoadBalancer`]:
//! application mode routes HTTP requests through listener rules to service
//! pools, network mode splices TCP connections through a single network
//! pool. [`LoadBalancer::from_config`] composes either from a configuration
//! record.

mod app;
mod error;
mod net;
mod types;

pub use app::ApplicationBalancer;
pub use error::{BalancerError, BalancerResult};
pub use net::NetworkBalancer;
pub use types::LoadBalancerKind;

use crate::config::{Config, TargetGroupConfig};
use crate::rules::{Rule, RuleAction};
use crate::shutdown::{ListenerHandle, StopSet};
use crate::targets::TargetGroup;
use std::time::Duration;

/// A configured load balancer in one of its two modes.
#[derive(Debug)]
pub enum LoadBalancer {
    /// Request-layer HTTP(S) balancer.
    Application(ApplicationBalancer),
    /// Transport-layer TCP balancer.
    Network(NetworkBalancer),
}

impl LoadBalancer {
    /// Compose a load balancer from a configuration record.
    pub fn from_config(config: &Config) -> BalancerResult<Self> {
        let mut balancer = match LoadBalancerKind::parse(&config.lb_type) {
            LoadBalancerKind::Application => Self::Application(ApplicationBalancer::new(
                Duration::from_secs(config.request_rate),
                config.request_rate_cap,
            )),
            LoadBalancerKind::Network => Self::Network(NetworkBalancer::new(
                Duration::from_secs(config.timeout),
            )),
            LoadBalancerKind::Unknown => {
                return Err(BalancerError::UnknownType(config.lb_type.clone()));
            },
        };

        balancer.set_err_response_format(&config.resp_format);
        if config.tls_enabled {
            balancer.set_tls(&config.tls_cert_file, &config.tls_key_file);
        }
        for group_config in &config.target_groups {
            let group = build_group(group_config, balancer.err_response_format())?;
            balancer.add_target_group(&group)?;
        }
        Ok(balancer)
    }

    /// Register a target group.
    pub fn add_target_group(&mut self, group: &TargetGroup) -> BalancerResult<()> {
        match self {
            Self::Application(app) => app.add_target_group(group),
            Self::Network(net) => net.add_target_group(group),
        }
    }

    /// Start passive health checking for every pool.
    #[must_use]
    pub fn health_check(&self, interval: Duration) -> StopSet {
        match self {
            Self::Application(app) => app.health_check(interval),
            Self::Network(net) => StopSet::from(vec![net.health_check(interval)]),
        }
    }

    /// Start the limiter garbage collectors. Network mode has none.
    #[must_use]
    pub fn gc(&self) -> StopSet {
        match self {
            Self::Application(app) => app.gc(),
            Self::Network(_) => StopSet::new(),
        }
    }

    /// Start listening on the given address.
    pub async fn start(&self, laddr: &str) -> BalancerResult<ListenerHandle> {
        match self {
            Self::Application(app) => app.start(laddr).await,
            Self::Network(net) => net.start(laddr).await,
        }
    }

    /// Set the error response format; unknown formats are ignored.
    pub fn set_err_response_format(&mut self, format: &str) {
        match self {
            Self::Application(app) => app.set_err_response_format(format),
            Self::Network(net) => net.set_err_response_format(format),
        }
    }

    /// Enable TLS with the given certificate and key files. Ignored in
    /// network mode.
    pub fn set_tls(&mut self, cert_file: &str, key_file: &str) {
        match self {
            Self::Application(app) => app.set_tls(cert_file, key_file),
            Self::Network(net) => net.set_tls(cert_file, key_file),
        }
    }

    /// The balancer's kind.
    #[must_use]
    pub fn kind(&self) -> LoadBalancerKind {
        match self {
            Self::Application(_) => LoadBalancerKind::Application,
            Self::Network(_) => LoadBalancerKind::Network,
        }
    }

    /// The balancer's long type name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind().long_name()
    }

    fn err_response_format(&self) -> crate::targets::ResponseFormat {
        match self {
            Self::Application(app) => app.err_response_format(),
            Self::Network(net) => net.err_response_format(),
        }
    }
}

/// Build a target group from its configuration: URL targets win over
/// host/port pairs.
fn build_group(
    config: &TargetGroupConfig,
    format: crate::targets::ResponseFormat,
) -> BalancerResult<TargetGroup> {
    let rule = Rule::new(
        RuleAction::parse(&config.rule.action),
        config.rule.conditions.clone(),
    );
    let mut group = TargetGroup::new(&config.name, &config.protocol, rule);
    group.set_err_response_format(format);
    for target in &config.targets {
        if target.url.is_empty() {
            group.add_target(&target.host, target.port);
        } else {
            group.add_service_target(&target.url)?;
        }
    }
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;

    #[test]
    fn test_from_config_application() {
        let config = load_str(
            r#"{
                "type": "application",
                "request_rate": 1,
                "request_rate_cap": 10,
                "target_groups": [{
                    "name": "web",
                    "protocol": "http",
                    "rule": {"action": "forward", "conditions": [["always;"]]},
                    "targets": [{"host": "10.0.0.1", "port": 8080}]
                }]
            }"#,
        )
        .unwrap();
        let balancer = LoadBalancer::from_config(&config).unwrap();
        assert_eq!(balancer.kind(), LoadBalancerKind::Application);
        assert_eq!(balancer.type_name(), "application");
    }

    #[test]
    fn test_from_config_network() {
        let config = load_str(
            r#"{
                "type": "net",
                "timeout": 5,
                "target_groups": [{
                    "name": "upstream",
                    "protocol": "tcp",
                    "targets": [{"host": "10.0.0.1", "port": 6000}]
                }]
            }"#,
        )
        .unwrap();
        let balancer = LoadBalancer::from_config(&config).unwrap();
        assert_eq!(balancer.kind(), LoadBalancerKind::Network);
        assert_eq!(balancer.type_name(), "network");
    }

    #[test]
    fn test_from_config_unknown_type() {
        let config = load_str(r#"{"type": "sideways"}"#).unwrap();
        assert!(matches!(
            LoadBalancer::from_config(&config),
            Err(BalancerError::UnknownType(_))
        ));
    }

    #[test]
    fn test_from_config_invalid_rule() {
        let config = load_str(
            r#"{
                "type": "app",
                "target_groups": [{
                    "name": "web",
                    "protocol": "http",
                    "rule": {"action": "forward", "conditions": [["bogus-key = x"]]},
                    "targets": [{"host": "10.0.0.1", "port": 8080}]
                }]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            LoadBalancer::from_config(&config),
            Err(BalancerError::Rule(_))
        ));
    }

    #[test]
    fn test_from_config_url_target() {
        let config = load_str(
            r#"{
                "type": "app",
                "target_groups": [{
                    "name": "web",
                    "protocol": "http",
                    "rule": {"action": "forward", "conditions": [["always;"]]},
                    "targets": [{"url": "http://10.0.0.9:9090"}]
                }]
            }"#,
        )
        .unwrap();
        let balancer = LoadBalancer::from_config(&config).unwrap();
        let LoadBalancer::Application(app) = balancer else {
            panic!("expected application balancer");
        };
        assert_eq!(app.entries().len(), 1);
    }
}
