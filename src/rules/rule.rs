//! Listener rules and request matching.

use super::cidr::{is_cidr, Network};
use super::client_ip::client_ip;
use super::condition::{Condition, ConditionKey, ConditionOp};
use super::error::{RuleError, RuleResult};
use super::wildcard::match_pattern;
use super::RuleAction;
use http::request::Parts;
use std::net::{IpAddr, SocketAddr};

/// The request attributes a rule is matched against.
///
/// A view decoupled from any particular HTTP library so the evaluator can be
/// exercised directly in tests.
#[derive(Debug, Clone, Default)]
pub struct RequestInfo {
    /// The request's Host header value.
    pub host: String,
    /// The request method, uppercase.
    pub method: String,
    /// The request path.
    pub path: String,
    /// The extracted client IP, if one could be determined.
    pub client_ip: Option<IpAddr>,
}

impl RequestInfo {
    /// Build the view from request head parts and the peer address.
    #[must_use]
    pub fn from_parts(parts: &Parts, remote_addr: Option<SocketAddr>) -> Self {
        Self::build(&parts.method, &parts.uri, &parts.headers, remote_addr)
    }

    /// Build the view from a request without consuming it.
    #[must_use]
    pub fn from_request<B>(req: &http::Request<B>, remote_addr: Option<SocketAddr>) -> Self {
        Self::build(req.method(), req.uri(), req.headers(), remote_addr)
    }

    fn build(
        method: &http::Method,
        uri: &http::Uri,
        headers: &http::HeaderMap,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let host = headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .or_else(|| uri.host().map(str::to_owned))
            .unwrap_or_default();
        Self {
            host,
            method: method.as_str().to_owned(),
            path: uri.path().to_owned(),
            client_ip: client_ip(headers, remote_addr),
        }
    }
}

/// A listener rule: an action plus an AND of OR-groups of conditions.
#[derive(Debug, Clone, Default)]
pub struct Rule {
    /// The action applied when the rule matches.
    pub action: RuleAction,
    /// Condition groups: every group must match, any member satisfies a
    /// group.
    pub conditions: Vec<Vec<Condition>>,
}

impl Rule {
    /// Create a rule from an action and its condition groups.
    #[must_use]
    pub fn new(action: RuleAction, conditions: Vec<Vec<Condition>>) -> Self {
        Self { action, conditions }
    }

    /// Validate the rule: the action and every condition key and operator
    /// must be known.
    pub fn valid(&self) -> RuleResult<()> {
        if self.action == RuleAction::Unknown {
            return Err(RuleError::UnknownAction);
        }
        for cond in self.conditions.iter().flatten() {
            if cond.key_kind() == ConditionKey::Unknown {
                return Err(RuleError::InvalidKey {
                    condition: cond.as_str().to_owned(),
                });
            }
            if cond.operator() == ConditionOp::Unknown {
                return Err(RuleError::InvalidOperator {
                    condition: cond.as_str().to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Return true if the request satisfies the rule's conditions.
    ///
    /// An `always` condition anywhere forces a match. Otherwise every group
    /// must be satisfied by at least one of its members.
    #[must_use]
    pub fn matches(&self, req: &RequestInfo) -> bool {
        if self
            .conditions
            .iter()
            .flatten()
            .any(|c| c.key_kind() == ConditionKey::Always)
        {
            return true;
        }
        self.conditions
            .iter()
            .all(|group| group.iter().any(|cond| match_request(cond, req)))
    }
}

/// Match a single condition against the request view.
fn match_request(cond: &Condition, req: &RequestInfo) -> bool {
    let op = cond.operator();
    let expected = cond.value();
    match cond.key_kind() {
        ConditionKey::Host => match_text(expected, &req.host, op),
        ConditionKey::Method => match_text(expected, &req.method, op),
        ConditionKey::Path => match_path(expected, &req.path, op),
        ConditionKey::SourceIp => match_source_ip(expected, req.client_ip, op),
        ConditionKey::Always => true,
        ConditionKey::Unknown => false,
    }
}

/// Plain text comparison. Unknown operators never match.
fn match_text(expected: &str, actual: &str, op: ConditionOp) -> bool {
    match op {
        ConditionOp::Equal => expected == actual,
        ConditionOp::NotEqual => expected != actual,
        ConditionOp::EqualInsensitive => expected.eq_ignore_ascii_case(actual),
        ConditionOp::NotEqualInsensitive => !expected.eq_ignore_ascii_case(actual),
        ConditionOp::Contain => actual.contains(expected),
        ConditionOp::NotContain => !actual.contains(expected),
        _ => false,
    }
}

/// Path comparison: equality operators treat the expected value as a
/// wildcard pattern.
fn match_path(pattern: &str, path: &str, op: ConditionOp) -> bool {
    match op {
        ConditionOp::Equal => match_pattern(pattern, path),
        ConditionOp::NotEqual => !match_pattern(pattern, path),
        ConditionOp::EqualInsensitive => pattern.eq_ignore_ascii_case(path),
        ConditionOp::NotEqualInsensitive => !pattern.eq_ignore_ascii_case(path),
        ConditionOp::Contain => path.contains(pattern),
        ConditionOp::NotContain => !path.contains(pattern),
        _ => false,
    }
}

/// Source IP comparison: CIDR-shaped values use network membership,
/// anything else compares the textual address. An unextractable client IP
/// never matches.
fn match_source_ip(expected: &str, client_ip: Option<IpAddr>, op: ConditionOp) -> bool {
    let Some(ip) = client_ip else {
        return false;
    };
    if is_cidr(expected) {
        let Some(network) = Network::parse(expected) else {
            return false;
        };
        let contained = network.contains(ip);
        return match op {
            ConditionOp::Equal | ConditionOp::EqualInsensitive => contained,
            ConditionOp::NotEqual | ConditionOp::NotEqualInsensitive => !contained,
            _ => false,
        };
    }
    match_text(expected, &ip.to_string(), op)
}
