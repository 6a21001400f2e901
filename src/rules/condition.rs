//! Condition statements.
//!
//! A condition is a single predicate string of the form `<key> <op> <value>`.
//! The string is kept verbatim; key, operator and value are extracted on
//! demand so configuration files can carry conditions as plain strings.

use serde::{Deserialize, Serialize};

/// The request attribute a condition tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKey {
    /// The key string was not recognized.
    Unknown,
    /// The request's Host header.
    Host,
    /// The request method.
    Method,
    /// The request path, matched as a wildcard pattern.
    Path,
    /// The client's source IP address.
    SourceIp,
    /// Matches unconditionally and short-circuits the whole rule.
    Always,
}

impl ConditionKey {
    /// Parse a key from its string form.
    #[must_use]
    pub fn parse(v: &str) -> Self {
        for key in [
            Self::Host,
            Self::Method,
            Self::Path,
            Self::SourceIp,
            Self::Always,
        ] {
            if v.eq_ignore_ascii_case(key.as_str()) {
                return key;
            }
        }
        Self::Unknown
    }

    /// The string representation of the key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Host => "host-header",
            Self::Method => "http-request-method",
            Self::Path => "path-pattern",
            Self::SourceIp => "source-ip",
            Self::Always => "always",
        }
    }
}

/// A condition operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    /// The operator could not be identified.
    Unknown,
    /// `;`: no operation; used with the `always` key.
    NoOp,
    /// `!~`: not equal, case-insensitive.
    NotEqualInsensitive,
    /// `=~`: equal, case-insensitive.
    EqualInsensitive,
    /// `!=`: not equal.
    NotEqual,
    /// `=`: equal.
    Equal,
    /// `!contains`: substring absent.
    NotContain,
    /// `contains`: substring present.
    Contain,
}

/// Operator tokens in scan precedence order: longer tokens first so that
/// `!=` is never mistaken for `=`, nor `!contains` for `contains`.
const OPERATOR_PRECEDENCE: [ConditionOp; 7] = [
    ConditionOp::NotContain,
    ConditionOp::Contain,
    ConditionOp::EqualInsensitive,
    ConditionOp::NotEqualInsensitive,
    ConditionOp::NotEqual,
    ConditionOp::Equal,
    ConditionOp::NoOp,
];

impl ConditionOp {
    /// The operator's token as written in a condition string.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NoOp => ";",
            Self::NotEqualInsensitive => "!~",
            Self::EqualInsensitive => "=~",
            Self::NotEqual => "!=",
            Self::Equal => "=",
            Self::NotContain => "!contains",
            Self::Contain => "contains",
        }
    }

    /// Parse an operator from its token.
    #[must_use]
    pub fn parse(v: &str) -> Self {
        OPERATOR_PRECEDENCE
            .into_iter()
            .find(|op| op.token() == v)
            .unwrap_or(Self::Unknown)
    }
}

/// A single rule condition statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Condition(String);

impl Condition {
    /// Create a condition from its string form.
    #[must_use]
    pub fn new(statement: impl Into<String>) -> Self {
        Self(statement.into())
    }

    /// The raw condition statement.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Locate the operator: the earliest operator occurrence wins, ties at
    /// the same offset resolve to the longer token.
    fn find_operator(&self) -> Option<(usize, ConditionOp)> {
        let mut found: Option<(usize, ConditionOp)> = None;
        for op in OPERATOR_PRECEDENCE {
            if let Some(idx) = self.0.find(op.token()) {
                match found {
                    Some((at, _)) if at <= idx => {},
                    _ => found = Some((idx, op)),
                }
            }
        }
        found
    }

    /// The key part of the statement, whitespace-trimmed. Empty when no
    /// operator is present.
    #[must_use]
    pub fn key(&self) -> &str {
        match self.find_operator() {
            Some((idx, _)) => self.0[..idx].trim(),
            None => "",
        }
    }

    /// The parsed key kind.
    #[must_use]
    pub fn key_kind(&self) -> ConditionKey {
        ConditionKey::parse(self.key())
    }

    /// The value part of the statement, whitespace-trimmed. Empty when no
    /// operator is present.
    #[must_use]
    pub fn value(&self) -> &str {
        match self.find_operator() {
            Some((idx, op)) => self.0[idx + op.token().len()..].trim(),
            None => "",
        }
    }

    /// The operator of the statement.
    #[must_use]
    pub fn operator(&self) -> ConditionOp {
        self.find_operator()
            .map_or(ConditionOp::Unknown, |(_, op)| op)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Condition {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        for key in [
            ConditionKey::Host,
            ConditionKey::Method,
            ConditionKey::Path,
            ConditionKey::SourceIp,
            ConditionKey::Always,
        ] {
            assert_eq!(ConditionKey::parse(key.as_str()), key);
        }
        assert_eq!(ConditionKey::parse("not-a-key"), ConditionKey::Unknown);
    }

    #[test]
    fn test_operator_round_trip() {
        for op in OPERATOR_PRECEDENCE {
            assert_eq!(ConditionOp::parse(op.token()), op);
        }
        assert_eq!(ConditionOp::parse("=="), ConditionOp::Unknown);
    }

    #[test]
    fn test_condition_key() {
        let cond = Condition::new("my_key=~some_value");
        assert_eq!(cond.key(), "my_key");

        let cond = Condition::new("my_key != some_value");
        assert_eq!(cond.key(), "my_key");
    }

    #[test]
    fn test_condition_value() {
        let cond = Condition::new("my_key=~some_value");
        assert_eq!(cond.value(), "some_value");

        let cond = Condition::new("my_key != some_value");
        assert_eq!(cond.value(), "some_value");
    }

    #[test]
    fn test_condition_operator() {
        assert_eq!(
            Condition::new("my_key=~some_value").operator(),
            ConditionOp::EqualInsensitive
        );
        assert_eq!(
            Condition::new("my_key != some_value").operator(),
            ConditionOp::NotEqual
        );
        assert_eq!(
            Condition::new("path-pattern !contains /users").operator(),
            ConditionOp::NotContain
        );
        assert_eq!(
            Condition::new("path-pattern contains /users").operator(),
            ConditionOp::Contain
        );
        assert_eq!(Condition::new("always;").operator(), ConditionOp::NoOp);
        assert_eq!(Condition::new("no operator here").operator(), ConditionOp::Unknown);
    }

    #[test]
    fn test_condition_operator_in_value_text() {
        // The earliest operator occurrence wins; operator-like text in the
        // value must not confuse the scan.
        let cond = Condition::new("path-pattern = /contains/check");
        assert_eq!(cond.key(), "path-pattern");
        assert_eq!(cond.operator(), ConditionOp::Equal);
        assert_eq!(cond.value(), "/contains/check");
    }

    #[test]
    fn test_condition_no_operator() {
        let cond = Condition::new("just a phrase");
        assert_eq!(cond.key(), "");
        assert_eq!(cond.value(), "");
        assert_eq!(cond.operator(), ConditionOp::Unknown);
    }
}
