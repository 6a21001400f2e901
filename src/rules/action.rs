//! Rule actions.

/// The action a listener rule applies to a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleAction {
    /// The action string was not recognized.
    #[default]
    Unknown,
    /// Forward the request to the group's pool.
    Forward,
    /// Redirect the request to the group's first target.
    Redirect,
}

impl RuleAction {
    /// Parse an action from its string form. Unrecognized strings map to
    /// [`RuleAction::Unknown`].
    #[must_use]
    pub fn parse(v: &str) -> Self {
        if v.eq_ignore_ascii_case("forward") {
            Self::Forward
        } else if v.eq_ignore_ascii_case("redirect") {
            Self::Redirect
        } else {
            Self::Unknown
        }
    }

    /// The string representation of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Forward => "forward",
            Self::Redirect => "redirect",
        }
    }
}
