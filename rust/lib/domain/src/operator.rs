use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Comparison operator of a domain leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    Greater,
    GreaterOrEqual,
    Lower,
    LowerOrEqual,
    /// `=like`: SQL pattern, case sensitive.
    Like,
    /// `=ilike`: SQL pattern, case insensitive.
    ILike,
    /// `like`: substring, case sensitive.
    Contains,
    NotContains,
    /// `ilike`: substring, case insensitive.
    IContains,
    NotIContains,
    In,
    NotIn,
    ChildOf,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub const ALL: [Operator; 17] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Greater,
        Operator::GreaterOrEqual,
        Operator::Lower,
        Operator::LowerOrEqual,
        Operator::Like,
        Operator::ILike,
        Operator::Contains,
        Operator::NotContains,
        Operator::IContains,
        Operator::NotIContains,
        Operator::In,
        Operator::NotIn,
        Operator::ChildOf,
        Operator::IsNull,
        Operator::IsNotNull,
    ];

    /// Wire token of the operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "=",
            Operator::NotEquals => "!=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::Lower => "<",
            Operator::LowerOrEqual => "<=",
            Operator::Like => "=like",
            Operator::ILike => "=ilike",
            Operator::Contains => "like",
            Operator::NotContains => "not like",
            Operator::IContains => "ilike",
            Operator::NotIContains => "not ilike",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::ChildOf => "child_of",
            Operator::IsNull => "is null",
            Operator::IsNotNull => "is not null",
        }
    }

    /// True for operators that match when the comparison does not.
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            Operator::NotEquals
                | Operator::NotContains
                | Operator::NotIContains
                | Operator::NotIn
                | Operator::IsNotNull
        )
    }
}

impl FromStr for Operator {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_lowercase();
        // "<>" and "==" are accepted by the client as aliases.
        let token = match token.as_str() {
            "<>" => "!=",
            "==" => "=",
            other => other,
        };
        Operator::ALL
            .iter()
            .find(|op| op.as_str() == token)
            .copied()
            .ok_or_else(|| DomainError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
