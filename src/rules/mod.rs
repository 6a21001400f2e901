//! Listener rule evaluation.
//!
//! A rule pairs an action (forward or redirect) with a condition expression
//! matched against each inbound request. Conditions are plain strings of the
//! form `<key> <op> <value>` and are grouped as an AND of OR-groups: every
//! group must be satisfied, and a group is satisfied by any one of its
//! members. The `always` key short-circuits the whole rule to a match.

mod action;
mod cidr;
mod client_ip;
mod condition;
mod error;
mod rule;
mod wildcard;

pub use action::RuleAction;
pub use cidr::{ip_limbs, is_cidr, Network};
pub use client_ip::client_ip;
pub use condition::{Condition, ConditionKey, ConditionOp};
pub use error::{RuleError, RuleResult};
pub use rule::{RequestInfo, Rule};
pub use wildcard::match_pattern;
