//! Domains: the client's prefix-notation filter expressions.
//!
//! A [`Domain`] is the wire form, a JSON array such as
//! `["|", ["name", "ilike", "john"], ["age", ">", 30]]`. It parses into a
//! [`Condition`] tree that the ORM evaluates, and a condition serializes
//! back into a domain.

pub mod condition;
pub mod domain;
pub mod error;
pub mod literal;
pub mod operator;

pub use condition::{Condition, Predicate};
pub use domain::{Domain, PREFIX_AND, PREFIX_NOT, PREFIX_OR};
pub use error::DomainError;
pub use literal::parse_string;
pub use operator::Operator;
