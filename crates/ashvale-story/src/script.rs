//! Shared pieces of the condition/effect string language.
//!
//! Both languages use the same dot-segmented surface syntax
//! (`category.verb.args`); this module holds the parse errors and the
//! comparison-operator handling shared between them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while parsing a condition or effect string.
///
/// These surface during content-load validation. At runtime an
/// unparsable string degrades instead (condition evaluates to `false`,
/// effect becomes a no-op) so broken content never ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The first dot segment is not a known category.
    #[error("unknown category in `{0}`")]
    UnknownCategory(String),
    /// The string is structurally wrong for its category.
    #[error("malformed expression `{raw}`: {reason}")]
    Malformed {
        /// The raw expression string.
        raw: String,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// A numeric operand failed to parse.
    #[error("bad number in `{0}`")]
    BadNumber(String),
}

impl ScriptError {
    pub(crate) fn malformed(raw: &str, reason: &'static str) -> Self {
        Self::Malformed {
            raw: raw.to_owned(),
            reason,
        }
    }
}

/// Result type for script parsing.
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Comparison operators usable in item-count and player-stat conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `==`
    Eq,
}

/// Operator spellings, longest first so `>=` wins over `>` at the same
/// position.
const OPERATORS: [(&str, CmpOp); 5] = [
    (">=", CmpOp::Ge),
    ("<=", CmpOp::Le),
    ("==", CmpOp::Eq),
    (">", CmpOp::Gt),
    ("<", CmpOp::Lt),
];

impl CmpOp {
    /// Splits `token` at the first comparison operator it contains,
    /// returning `(lhs, op, rhs)`, or `None` when no operator is present.
    #[must_use]
    pub fn split(token: &str) -> Option<(&str, Self, &str)> {
        for (i, _) in token.char_indices() {
            for (spelling, op) in OPERATORS {
                if token[i..].starts_with(spelling) {
                    return Some((&token[..i], op, &token[i + spelling.len()..]));
                }
            }
        }
        None
    }

    /// Applies the comparison to two values.
    #[must_use]
    pub fn compare(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
            Self::Eq => lhs == rhs,
        }
    }
}

/// Parses a numeric operand, mapping failure to [`ScriptError::BadNumber`].
pub(crate) fn parse_number(raw_expression: &str, token: &str) -> ScriptResult<i64> {
    token
        .trim()
        .parse()
        .map_err(|_| ScriptError::BadNumber(raw_expression.to_owned()))
}
