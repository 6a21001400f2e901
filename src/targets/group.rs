//! Target groups.

use super::error::TargetResult;
use super::response::ResponseFormat;
use super::target::Target;
use crate::rules::Rule;
use std::sync::Arc;

/// A named group of targets sharing a rule and protocol.
#[derive(Debug)]
pub struct TargetGroup {
    name: String,
    protocol: String,
    rule: Rule,
    err_resp_format: ResponseFormat,
    targets: Vec<Arc<Target>>,
}

impl TargetGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>, protocol: impl Into<String>, rule: Rule) -> Self {
        Self {
            name: name.into(),
            protocol: protocol.into(),
            rule,
            err_resp_format: ResponseFormat::default(),
            targets: Vec::new(),
        }
    }

    /// The group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group's protocol.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The group's rule.
    #[must_use]
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// The group's targets in registration order.
    #[must_use]
    pub fn targets(&self) -> &[Arc<Target>] {
        &self.targets
    }

    /// Add a target by host and port, inheriting the group's protocol.
    pub fn add_target(&mut self, host: impl Into<String>, port: Option<u16>) {
        let target = Target::new(host, port, self.protocol.clone());
        target.set_err_response_format(self.err_resp_format);
        self.targets.push(target);
    }

    /// Add a target from a service URL.
    pub fn add_service_target(&mut self, url: &str) -> TargetResult<()> {
        let target = Target::from_url(url)?;
        target.set_err_response_format(self.err_resp_format);
        self.targets.push(target);
        Ok(())
    }

    /// Set the error response format for the group and targets added after
    /// this call; unknown formats leave it unchanged.
    pub fn set_err_response_format(&mut self, format: ResponseFormat) {
        if format != ResponseFormat::Unknown {
            self.err_resp_format = format;
        }
    }
}
