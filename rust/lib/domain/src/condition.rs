use std::fmt;

use serde_json::Value;

use crate::operator::Operator;

/// A single `field operator value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field name or dotted path (`country_id.name`).
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

/// Boolean condition tree over predicates.
///
/// `All` is the identity condition produced by an empty domain; it
/// matches every record. The `and`/`or` constructors absorb it so that
/// parsed trees never contain it below the root. Written below the root
/// (only possible under `Not`), it renders as the always-true leaf
/// `id != False`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Condition {
    #[default]
    All,
    Leaf(Predicate),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn leaf(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Condition::Leaf(Predicate {
            field: field.into(),
            operator,
            value,
        })
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Condition::All)
    }

    pub fn and(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::All, c) | (c, Condition::All) => c,
            (a, b) => Condition::And(Box::new(a), Box::new(b)),
        }
    }

    /// `All` on either side makes the disjunction match everything.
    pub fn or(self, other: Condition) -> Condition {
        match (self, other) {
            (Condition::All, _) | (_, Condition::All) => Condition::All,
            (a, b) => Condition::Or(Box::new(a), Box::new(b)),
        }
    }

    pub fn negate(self) -> Condition {
        Condition::Not(Box::new(self))
    }

    /// Visit every predicate of the tree, left to right.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Condition::All => {}
            Condition::Leaf(p) => out.push(p),
            Condition::And(a, b) | Condition::Or(a, b) => {
                a.collect_predicates(out);
                b.collect_predicates(out);
            }
            Condition::Not(c) => c.collect_predicates(out),
        }
    }

    fn write_prefix(&self, out: &mut Vec<String>) {
        match self {
            Condition::All => out.push("[id != False]".into()),
            Condition::Leaf(p) => out.push(format!(
                "[{} {} {}]",
                p.field,
                p.operator,
                display_value(&p.value)
            )),
            Condition::And(a, b) => {
                out.push("&".into());
                a.write_prefix(out);
                b.write_prefix(out);
            }
            Condition::Or(a, b) => {
                out.push("|".into());
                a.write_prefix(out);
                b.write_prefix(out);
            }
            Condition::Not(c) => {
                out.push("!".into());
                c.write_prefix(out);
            }
        }
    }
}

/// Diagnostic rendering: `[| [Name like Will] & [Age > 0] [Age < 25]]`.
impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("[]");
        }
        let mut tokens = Vec::new();
        self.write_prefix(&mut tokens);
        write!(f, "[{}]", tokens.join(" "))
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Null | Value::Bool(false) => "False".into(),
        Value::Bool(true) => "True".into(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", parts.join(" "))
        }
        Value::Object(_) => v.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn all_is_absorbed() {
        let leaf = Condition::leaf("name", Operator::Equals, json!("a"));
        assert_eq!(Condition::All.and(leaf.clone()), leaf);
        assert_eq!(leaf.clone().and(Condition::All), leaf);
        assert_eq!(leaf.clone().or(Condition::All), Condition::All);
    }

    #[test]
    fn display_prefix_form() {
        let cond = Condition::leaf("Name", Operator::Contains, json!("Will")).or(
            Condition::leaf("Age", Operator::Greater, json!(0))
                .and(Condition::leaf("Age", Operator::Lower, json!(25))),
        );
        assert_eq!(cond.to_string(), "[| [Name like Will] & [Age > 0] [Age < 25]]");
    }

    #[test]
    fn display_literals() {
        let cond = Condition::leaf("active", Operator::Equals, json!(true))
            .and(Condition::leaf("parent_id", Operator::Equals, Value::Null))
            .and(Condition::leaf("id", Operator::In, json!([5, 7])).negate());
        assert_eq!(
            cond.to_string(),
            "[& & [active = True] [parent_id = False] ! [id in [5 7]]]"
        );
        assert_eq!(Condition::All.to_string(), "[]");
    }

    #[test]
    fn predicates_in_order() {
        let cond = Condition::leaf("a", Operator::Equals, json!(1))
            .or(Condition::leaf("b", Operator::Equals, json!(2)).negate());
        let fields: Vec<&str> = cond.predicates().iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b"]);
    }
}
