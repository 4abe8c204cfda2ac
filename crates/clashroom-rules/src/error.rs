//! Error types for rule sets and rule generation.

use std::time::Duration;

/// Why a candidate rule set was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleViolation {
    /// Fewer than three types can't give everyone both a win and a loss.
    #[error("a rule set needs at least 3 options, got {0}")]
    TooFewOptions(usize),

    #[error("an option has an empty name")]
    EmptyOption,

    #[error("option '{0}' is listed more than once")]
    DuplicateOption(String),

    #[error("option '{option}' refers to unknown option '{referenced}'")]
    UnknownOption { option: String, referenced: String },

    #[error("option '{0}' is related to itself")]
    SelfRelation(String),

    /// Both "A loses to B" and "B loses to A" were asserted.
    #[error("'{0}' and '{1}' each lose to the other")]
    Contradiction(String, String),

    /// Neither direction was asserted for a pair.
    #[error("'{0}' and '{1}' have no relation")]
    Unrelated(String, String),

    #[error("'{0}' never wins")]
    NeverWins(String),

    #[error("'{0}' never loses")]
    NeverLoses(String),
}

/// Errors from resolving a custom rule set.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// No generator is configured on this server.
    #[error("custom options are not enabled on this server")]
    Unavailable,

    #[error("no options to generate rules for")]
    NoOptions,

    /// The HTTP request itself failed (DNS, TLS, connection reset...).
    #[error("rule generator request failed: {0}")]
    Request(String),

    /// The generator answered with a non-success status.
    #[error("rule generator returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The reply could not be parsed into the expected shape.
    #[error("could not understand the rule generator's reply: {0}")]
    Malformed(String),

    /// The generator reported `success: false`.
    #[error("rule generator declined: {0}")]
    Rejected(String),

    /// The generated relations break a rule set invariant.
    #[error("generated rules are invalid: {0}")]
    Invalid(#[from] RuleViolation),

    /// The generated set is valid but leaves out a chosen option.
    #[error("generated rules do not cover option '{0}'")]
    MissingOption(String),

    #[error("rule generation timed out after {0:?}")]
    Timeout(Duration),
}
