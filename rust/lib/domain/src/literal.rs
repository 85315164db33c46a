//! Textual domains, as written in views and stored filters:
//! `[('name', 'ilike', 'john'), '|', ("age", ">", 30), ...]`.

use serde_json::{Number, Value};

use crate::domain::Domain;
use crate::error::DomainError;

/// Parse a Python-literal domain string into a [`Domain`].
///
/// Terms are tuples or lists of three elements, or quoted prefix
/// operators. Values may be quoted strings, `True`/`False`, `None`,
/// numbers, or nested lists and tuples of those.
pub fn parse_string(s: &str) -> Result<Domain, DomainError> {
    let s = s.trim();
    let inner = strip_pair(s, '[', ']').unwrap_or(s);
    let mut out = Vec::new();
    for tuple in split_top_level(inner, ',')? {
        let tuple = tuple.trim();
        if tuple.is_empty() {
            continue;
        }
        let body = strip_pair(tuple, '(', ')').or_else(|| strip_pair(tuple, '[', ']'));
        let terms = match body {
            Some(body) => split_top_level(body, ',')?,
            None => vec![tuple.to_string()],
        };
        match terms.as_slice() {
            [op] => out.push(Value::String(prefix_operator(op.trim()).ok_or_else(|| {
                DomainError::MalformedTerm(tuple.to_string())
            })?)),
            [field, op, value] => out.push(Value::Array(vec![
                Value::String(clean_quotes(field.trim())),
                Value::String(clean_quotes(op.trim())),
                parse_value(value)?,
            ])),
            _ => return Err(DomainError::MalformedTerm(tuple.to_string())),
        }
    }
    Ok(Domain::new(out))
}

/// A quoted `'&'`, `'|'` or `'!'`.
fn prefix_operator(term: &str) -> Option<String> {
    let quoted = term.len() >= 2 && term.starts_with(is_quote) && term.ends_with(is_quote);
    let op = clean_quotes(term);
    (quoted && matches!(op.as_str(), "&" | "|" | "!")).then_some(op)
}

fn strip_pair(s: &str, open: char, close: char) -> Option<&str> {
    s.strip_prefix(open).and_then(|rest| rest.strip_suffix(close))
}

fn closer_of(c: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        '\'' => Some('\''),
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        _ => None,
    }
}

fn is_quote(c: char) -> bool {
    c == '"' || c == '\''
}

/// Split `s` on `sep`, ignoring separators inside quotes and brackets.
///
/// A stack holds the closing character of every open region. Inside a
/// quote only the matching quote (or an escape) is significant.
fn split_top_level(s: &str, sep: char) -> Result<Vec<String>, DomainError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut stack: Vec<char> = Vec::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match stack.last().copied() {
            Some(q) if is_quote(q) => {
                current.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    stack.pop();
                }
                continue;
            }
            Some(close) if c == close => {
                stack.pop();
                current.push(c);
                continue;
            }
            _ => {}
        }
        if let Some(close) = closer_of(c) {
            stack.push(close);
            current.push(c);
        } else if matches!(c, ')' | ']' | '}') {
            return Err(DomainError::UnbalancedLiteral(s.to_string()));
        } else if c == sep && stack.is_empty() {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    if !stack.is_empty() {
        return Err(DomainError::UnbalancedLiteral(s.to_string()));
    }
    parts.push(current);
    Ok(parts)
}

/// Remove one pair of surrounding quotes, undoing backslash escapes.
fn clean_quotes(s: &str) -> String {
    let Some(body) = strip_pair(s, '"', '"').or_else(|| strip_pair(s, '\'', '\'')) else {
        return s.to_string();
    };
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn parse_value(s: &str) -> Result<Value, DomainError> {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with(is_quote) && s.ends_with(is_quote) {
        return Ok(Value::String(clean_quotes(s)));
    }
    if let Some(body) = strip_pair(s, '[', ']').or_else(|| strip_pair(s, '(', ')')) {
        let mut items = Vec::new();
        for item in split_top_level(body, ',')? {
            if !item.trim().is_empty() {
                items.push(parse_value(&item)?);
            }
        }
        return Ok(Value::Array(items));
    }
    match s {
        "True" | "true" => return Ok(Value::Bool(true)),
        "False" | "false" => return Ok(Value::Bool(false)),
        "None" | "null" => return Ok(Value::Null),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return Ok(Value::from(i));
    }
    if let Some(n) = s.parse::<f64>().ok().and_then(Number::from_f64) {
        return Ok(Value::Number(n));
    }
    tracing::debug!(literal = s, "unrecognized domain literal, using null");
    Ok(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dom(v: Value) -> Domain {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn single_tuple() {
        let parsed = parse_string(r#"[('Name', 'ilike', 'john')]"#).unwrap();
        assert_eq!(parsed, dom(json!([["Name", "ilike", "john"]])));
        assert_eq!(
            parsed.parse().unwrap(),
            dom(json!([["Name", "ilike", "john"]])).parse().unwrap()
        );
    }

    #[test]
    fn numbers() {
        let parsed = parse_string(r#"[("Val", "<", 123.5), ("Val", ">", -10)]"#).unwrap();
        assert_eq!(parsed, dom(json!([["Val", "<", 123.5], ["Val", ">", -10]])));
    }

    #[test]
    fn operators_and_mixed_brackets() {
        let parsed = parse_string(
            r#"['|', ("Name", "ilike", 'john'), '&', ["Val", "<", 123.5], ("Val", ">", -10)]"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            dom(json!([
                "|",
                ["Name", "ilike", "john"],
                "&",
                ["Val", "<", 123.5],
                ["Val", ">", -10]
            ]))
        );
    }

    #[test]
    fn commas_inside_quotes_and_lists() {
        let parsed =
            parse_string(r#"[('name', '=', 'Smith, John'), ('id', 'in', [1, 2, 3])]"#).unwrap();
        assert_eq!(
            parsed,
            dom(json!([["name", "=", "Smith, John"], ["id", "in", [1, 2, 3]]]))
        );
    }

    #[test]
    fn nested_quotes() {
        let parsed =
            parse_string(r#"[('name', '=', "it's (here)"), ('ref', '=', 'say \'hi\'')]"#).unwrap();
        assert_eq!(
            parsed,
            dom(json!([["name", "=", "it's (here)"], ["ref", "=", "say 'hi'"]]))
        );
    }

    #[test]
    fn booleans_and_none() {
        let parsed =
            parse_string("[('active', '=', True), ('parent_id', '=', None), ('x', '!=', false)]")
                .unwrap();
        assert_eq!(
            parsed,
            dom(json!([["active", "=", true], ["parent_id", "=", null], ["x", "!=", false]]))
        );
    }

    #[test]
    fn empty() {
        assert!(parse_string("[]").unwrap().is_empty());
        assert!(parse_string("  [ ]  ").unwrap().is_empty());
        assert!(parse_string("").unwrap().is_empty());
    }

    #[test]
    fn unbalanced() {
        assert!(matches!(
            parse_string("[('name', '=', 'john)]"),
            Err(DomainError::UnbalancedLiteral(_))
        ));
        assert!(matches!(
            parse_string("[('name', '=', 1))]"),
            Err(DomainError::UnbalancedLiteral(_))
        ));
    }

    #[test]
    fn wrong_tuple_size() {
        assert!(matches!(
            parse_string("[('name', '=')]"),
            Err(DomainError::MalformedTerm(_))
        ));
    }

    #[test]
    fn only_quoted_prefix_operators() {
        assert_eq!(
            parse_string("['!', ('a', '=', 1)]").unwrap(),
            dom(json!(["!", ["a", "=", 1]]))
        );
        for bad in [
            "belg",
            "not a domain",
            "[|, ('a', '=', 1)]",
            "['x', ('a', '=', 1)]",
        ] {
            assert!(
                matches!(parse_string(bad), Err(DomainError::MalformedTerm(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn display_parses_back() {
        let d = dom(json!(["|", ["name", "ilike", "john"], ["active", "=", true]]));
        assert_eq!(parse_string(&d.to_string()).unwrap(), d);
    }
}
