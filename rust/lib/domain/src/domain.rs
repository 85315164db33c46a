use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::Condition;
use crate::error::DomainError;
use crate::literal;

pub const PREFIX_AND: &str = "&";
pub const PREFIX_OR: &str = "|";
pub const PREFIX_NOT: &str = "!";

/// Wire form of a filter: a flat list of prefix operators and
/// `[field, operator, value]` leaves. `[]` matches every record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Domain(pub Vec<Value>);

impl Domain {
    pub fn new(terms: Vec<Value>) -> Self {
        Domain(terms)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn terms(&self) -> &[Value] {
        &self.0
    }

    /// Interpret a JSON value as a domain.
    ///
    /// Arrays are taken as is; strings go through the textual parser;
    /// `false` and `null` are the empty domain.
    pub fn from_value(v: &Value) -> Result<Domain, DomainError> {
        match v {
            Value::Array(items) => Ok(Domain(items.clone())),
            Value::String(s) => literal::parse_string(s),
            Value::Null | Value::Bool(false) => Ok(Domain::default()),
            other => Err(DomainError::MalformedTerm(other.to_string())),
        }
    }

    /// Parse the domain into a condition tree.
    ///
    /// Terms left over after a complete expression are ANDed in, so
    /// `[A, B]` is `["&", A, B]`.
    pub fn parse(&self) -> Result<Condition, DomainError> {
        let terms = &self.0;
        let mut pos = 0;
        let mut cond = Condition::All;
        while pos < terms.len() {
            let (next, end) = parse_term(terms, pos)?;
            cond = cond.and(next);
            pos = end;
        }
        Ok(cond)
    }

    /// Serialize a condition tree back to its wire form.
    pub fn from_condition(cond: &Condition) -> Domain {
        let mut terms = Vec::new();
        if !cond.is_all() {
            write_terms(cond, &mut terms);
        }
        Domain(terms)
    }
}

impl From<Vec<Value>> for Domain {
    fn from(terms: Vec<Value>) -> Self {
        Domain(terms)
    }
}

/// Parse one complete expression starting at `pos`.
///
/// Returns the expression and the index of the first unconsumed term.
fn parse_term(terms: &[Value], pos: usize) -> Result<(Condition, usize), DomainError> {
    let Some(term) = terms.get(pos) else {
        return Err(DomainError::MalformedTerm("unexpected end of domain".into()));
    };
    match term {
        Value::String(op) => {
            let arity = match op.as_str() {
                PREFIX_AND | PREFIX_OR => 2,
                PREFIX_NOT => 1,
                _ => {
                    return Err(DomainError::MalformedTerm(format!(
                        "unknown prefix operator '{}'",
                        op
                    )));
                }
            };
            let mut operands = Vec::with_capacity(arity);
            let mut next = pos + 1;
            for _ in 0..arity {
                if next >= terms.len() {
                    return Err(DomainError::MissingOperand(op.clone()));
                }
                let (cond, end) = parse_term(terms, next)?;
                operands.push(cond);
                next = end;
            }
            let mut operands = operands.into_iter();
            let first = operands.next().unwrap_or_default();
            let cond = match op.as_str() {
                PREFIX_NOT => first.negate(),
                PREFIX_OR => first.or(operands.next().unwrap_or_default()),
                _ => first.and(operands.next().unwrap_or_default()),
            };
            Ok((cond, next))
        }
        Value::Array(leaf) => Ok((parse_leaf(leaf)?, pos + 1)),
        other => Err(DomainError::MalformedTerm(other.to_string())),
    }
}

fn parse_leaf(leaf: &[Value]) -> Result<Condition, DomainError> {
    let [field, op, value] = leaf else {
        return Err(DomainError::MalformedTerm(Value::Array(leaf.to_vec()).to_string()));
    };
    let field = field.as_str().ok_or_else(|| {
        DomainError::MalformedTerm(format!("field name must be a string: {}", field))
    })?;
    let op = op
        .as_str()
        .ok_or_else(|| DomainError::MalformedTerm(format!("operator must be a string: {}", op)))?
        .parse()?;
    Ok(Condition::leaf(field, op, value.clone()))
}

fn write_terms(cond: &Condition, out: &mut Vec<Value>) {
    match cond {
        Condition::All => out.push(serde_json::json!(["id", "!=", false])),
        Condition::Leaf(p) => out.push(Value::Array(vec![
            Value::String(p.field.clone()),
            Value::String(p.operator.as_str().to_string()),
            p.value.clone(),
        ])),
        Condition::And(a, b) => {
            out.push(Value::String(PREFIX_AND.into()));
            write_terms(a, out);
            write_terms(b, out);
        }
        Condition::Or(a, b) => {
            out.push(Value::String(PREFIX_OR.into()));
            write_terms(a, out);
            write_terms(b, out);
        }
        Condition::Not(c) => {
            out.push(Value::String(PREFIX_NOT.into()));
            write_terms(c, out);
        }
    }
}

/// Client literal form: `["|", ["name", "ilike", "john"], ["active", "=", True]]`.
///
/// Booleans are written `True`/`False` and null as `False`, which is what
/// the web client evaluates domains stored as text with.
impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(literal_value).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

fn literal_value(v: &Value) -> String {
    match v {
        Value::Null | Value::Bool(false) => "False".into(),
        Value::Bool(true) => "True".into(),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(literal_value).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", Value::String(k.clone()), literal_value(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
        // Strings get JSON quoting and escaping.
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Operator;
    use serde_json::json;

    fn dom(v: Value) -> Domain {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn empty_domain_matches_all() {
        let d = Domain::default();
        assert_eq!(d.parse().unwrap(), Condition::All);
        assert_eq!(d.parse().unwrap().to_string(), "[]");
        assert_eq!(d.to_string(), "[]");
        assert_eq!(Domain::from_condition(&Condition::All), d);
    }

    #[test]
    fn implicit_and() {
        let implicit = dom(json!([["name", "=", "a"], ["age", ">", 3]]));
        let explicit = dom(json!(["&", ["name", "=", "a"], ["age", ">", 3]]));
        assert_eq!(implicit.parse().unwrap(), explicit.parse().unwrap());
    }

    #[test]
    fn implicit_and_after_operator_expression() {
        let d = dom(json!(["|", ["a", "=", 1], ["b", "=", 2], ["c", "=", 3]]));
        let expected = Condition::leaf("a", Operator::Equals, json!(1))
            .or(Condition::leaf("b", Operator::Equals, json!(2)))
            .and(Condition::leaf("c", Operator::Equals, json!(3)));
        assert_eq!(d.parse().unwrap(), expected);
    }

    #[test]
    fn operator_nesting() {
        let d = dom(json!([
            "|",
            ["Name", "like", "Will"],
            "&",
            ["Age", ">", 0],
            ["Age", "<", 25]
        ]));
        let cond = d.parse().unwrap();
        assert_eq!(cond.to_string(), "[| [Name like Will] & [Age > 0] [Age < 25]]");
        assert_eq!(Domain::from_condition(&cond), d);
    }

    #[test]
    fn nested_or_keeps_order() {
        let d = dom(json!([
            "|",
            "|",
            ["Name", "ilike", "john"],
            ["Name", "ilike", "jane"],
            ["Name", "ilike", "will"]
        ]));
        let cond = d.parse().unwrap();
        assert_eq!(Domain::from_condition(&cond), d);
    }

    #[test]
    fn not_operator() {
        let d = dom(json!(["!", ["active", "=", true], ["name", "=", "x"]]));
        let cond = d.parse().unwrap();
        assert_eq!(cond.to_string(), "[& ! [active = True] [name = x]]");
    }

    #[test]
    fn round_trip_is_stable() {
        let domains = vec![
            json!([]),
            json!([["a", "=", 1]]),
            json!([["a", "=", 1], ["b", "!=", false], ["c", "in", [1, 2]]]),
            json!(["!", "|", ["a", "=", 1], ["b", "=", 2]]),
            json!(["|", "&", ["a", "=", 1], ["b", "=", 2], "!", ["c", "ilike", "x"]]),
        ];
        for d in domains {
            let parsed = dom(d).parse().unwrap();
            let reparsed = Domain::from_condition(&parsed).parse().unwrap();
            assert_eq!(parsed, reparsed);
        }
    }

    #[test]
    fn malformed_leaf() {
        let err = dom(json!([["a", "="]])).parse().unwrap_err();
        assert!(matches!(err, DomainError::MalformedTerm(_)));

        let err = dom(json!([["a", "=", 1, 2]])).parse().unwrap_err();
        assert!(matches!(err, DomainError::MalformedTerm(_)));

        let err = dom(json!([42])).parse().unwrap_err();
        assert!(matches!(err, DomainError::MalformedTerm(_)));
    }

    #[test]
    fn missing_operand() {
        let err = dom(json!(["|", ["a", "=", 1]])).parse().unwrap_err();
        assert_eq!(err, DomainError::MissingOperand("|".into()));

        let err = dom(json!(["!"])).parse().unwrap_err();
        assert_eq!(err, DomainError::MissingOperand("!".into()));
    }

    #[test]
    fn unknown_operators() {
        let err = dom(json!(["^", ["a", "=", 1], ["b", "=", 1]])).parse().unwrap_err();
        assert!(matches!(err, DomainError::MalformedTerm(_)));

        let err = dom(json!([["a", "~", 1]])).parse().unwrap_err();
        assert_eq!(err, DomainError::UnknownOperator("~".into()));
    }

    #[test]
    fn unknown_field_is_not_a_parse_error() {
        assert!(dom(json!([["no_such_field", "=", 1]])).parse().is_ok());
    }

    #[test]
    fn literal_display() {
        let d = dom(json!([
            "|",
            ["name", "ilike", "jo\"hn"],
            ["parent_id", "=", null],
            ["active", "=", true]
        ]));
        assert_eq!(
            d.to_string(),
            concat!(
                r#"["|", ["name", "ilike", "jo\"hn"], "#,
                r#"["parent_id", "=", False], ["active", "=", True]]"#
            )
        );
    }

    #[test]
    fn from_value_shapes() {
        assert!(Domain::from_value(&json!(false)).unwrap().is_empty());
        assert!(Domain::from_value(&json!(null)).unwrap().is_empty());
        assert_eq!(
            Domain::from_value(&json!("[('name', '=', 'x')]")).unwrap(),
            dom(json!([["name", "=", "x"]]))
        );
        assert!(Domain::from_value(&json!(3)).is_err());
    }
}
