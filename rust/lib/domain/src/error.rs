use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A leaf is not a `[field, operator, value]` triple, or a term is
    /// neither a leaf nor a prefix operator.
    #[error("malformed domain term: {0}")]
    MalformedTerm(String),

    /// A prefix operator is not followed by enough operands.
    #[error("missing operand for '{0}'")]
    MissingOperand(String),

    #[error("unknown domain operator: {0}")]
    UnknownOperator(String),

    /// Unterminated quote or bracket in a textual domain.
    #[error("unbalanced domain literal: {0}")]
    UnbalancedLiteral(String),
}
