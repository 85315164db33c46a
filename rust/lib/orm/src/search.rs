//! In-memory evaluation of conditions and orderings over stored records.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hexya_core::cast_to_integer;
use hexya_domain::{Condition, Operator, Predicate};
use serde_json::Value;

use crate::data::FieldMap;
use crate::env::Environment;
use crate::error::OrmError;
use crate::fields::{magic, FieldDef, FieldType};
use crate::model::ModelDef;

/// A search: a condition plus paging and ordering.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub cond: Condition,
    pub limit: Option<usize>,
    pub offset: usize,
    /// Order clause such as `"name desc, id"`. The model order when unset.
    pub order: Option<String>,
}

impl SearchQuery {
    pub fn new(cond: Condition) -> Self {
        Self {
            cond,
            ..Default::default()
        }
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn order(mut self, order: &str) -> Self {
        let order = order.trim();
        self.order = (!order.is_empty()).then(|| order.to_string());
        self
    }
}

/// Evaluates conditions against records of one environment, caching
/// the records of related models it has to load.
pub(crate) struct Evaluator<'a> {
    env: &'a Environment,
    cache: RefCell<HashMap<String, Arc<Vec<FieldMap>>>>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(env: &'a Environment) -> Self {
        Self {
            env,
            cache: RefCell::new(HashMap::new()),
        }
    }

    fn records_of(&self, model: &str) -> Result<Arc<Vec<FieldMap>>, OrmError> {
        if let Some(rows) = self.cache.borrow().get(model) {
            return Ok(rows.clone());
        }
        let rows = Arc::new(self.env.load_all(model)?);
        self.cache.borrow_mut().insert(model.to_string(), rows.clone());
        Ok(rows)
    }

    pub(crate) fn matches(
        &self,
        model: &ModelDef,
        record: &FieldMap,
        cond: &Condition,
    ) -> Result<bool, OrmError> {
        match cond {
            Condition::All => Ok(true),
            Condition::Leaf(p) => self.matches_predicate(model, record, p),
            Condition::And(a, b) => {
                Ok(self.matches(model, record, a)? && self.matches(model, record, b)?)
            }
            Condition::Or(a, b) => {
                Ok(self.matches(model, record, a)? || self.matches(model, record, b)?)
            }
            Condition::Not(c) => Ok(!self.matches(model, record, c)?),
        }
    }

    fn matches_predicate(
        &self,
        model: &ModelDef,
        record: &FieldMap,
        p: &Predicate,
    ) -> Result<bool, OrmError> {
        let path: Vec<&str> = p.field.split('.').collect();
        self.matches_path(model, record, &path, p.operator, &p.value)
    }

    fn matches_path(
        &self,
        model: &ModelDef,
        record: &FieldMap,
        path: &[&str],
        op: Operator,
        value: &Value,
    ) -> Result<bool, OrmError> {
        let Some((head, rest)) = path.split_first() else {
            return Ok(false);
        };
        let field = model.field_or_err(head)?;
        if rest.is_empty() {
            return self.matches_field(model, record, field, op, value);
        }
        // Dotted path: the condition holds if any related record matches
        // the rest of the path.
        if !field.field_type.is_relation() {
            return Err(OrmError::InvalidValue(format!(
                "'{}' is not a relation field of {}",
                head, model.name
            )));
        }
        let target = self.env.model(field.relation_model()?)?;
        let ids = self.related_ids(model, record, field)?;
        if ids.is_empty() {
            return Ok(compare(FieldType::Char, &Value::Null, op, value));
        }
        let rows = self.records_of(&target.name)?;
        for row in rows.iter().filter(|r| ids.contains(&record_id(r))) {
            if self.matches_path(&target, row, rest, op, value)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_field(
        &self,
        model: &ModelDef,
        record: &FieldMap,
        field: &FieldDef,
        op: Operator,
        value: &Value,
    ) -> Result<bool, OrmError> {
        if op == Operator::ChildOf {
            let target = match field.json.as_str() {
                magic::ID => model.name.clone(),
                _ => field.relation_model()?.to_string(),
            };
            let allowed = self.descendants(&target, value)?;
            let ids = if field.json == magic::ID {
                vec![record_id(record)]
            } else {
                self.related_ids(model, record, field)?
            };
            return Ok(ids.iter().any(|id| allowed.contains(id)));
        }

        if field.json == magic::ID {
            return Ok(compare(FieldType::Integer, &Value::from(record_id(record)), op, value));
        }
        if field.json == magic::DISPLAY_NAME {
            let name = Value::String(model.display_name(record));
            return Ok(compare(FieldType::Char, &name, op, value));
        }
        if field.field_type.is_relation() {
            let ids = self.related_ids(model, record, field)?;
            return self.matches_relation(field, &ids, op, value);
        }
        let lhs = record.get(&field.json).unwrap_or(&Value::Null);
        Ok(compare(field.field_type, lhs, op, value))
    }

    /// Relation fields compare by id, or by display name when given a
    /// string.
    fn matches_relation(
        &self,
        field: &FieldDef,
        ids: &[i64],
        op: Operator,
        value: &Value,
    ) -> Result<bool, OrmError> {
        if matches!(op, Operator::IsNull | Operator::IsNotNull) || is_unset(value) {
            let empty = ids.is_empty();
            return Ok(match op {
                Operator::IsNull | Operator::Equals => empty,
                Operator::IsNotNull | Operator::NotEquals => !empty,
                _ => false,
            });
        }
        if value.is_string() {
            let names = self.display_names(field.relation_model()?, ids)?;
            let any = names.iter().any(|n| {
                compare(FieldType::Char, &Value::String(n.clone()), positive_of(op), value)
            });
            return Ok(if op.is_negative() { !any } else { any });
        }
        let wanted = ids_of(value);
        let hit = ids.iter().any(|id| wanted.contains(id));
        Ok(match op {
            Operator::Equals | Operator::In => hit,
            Operator::NotEquals | Operator::NotIn => !hit,
            _ => ids
                .iter()
                .any(|id| compare(FieldType::Integer, &Value::from(*id), op, value)),
        })
    }

    /// Ids a relation field of `record` points to.
    pub(crate) fn related_ids(
        &self,
        model: &ModelDef,
        record: &FieldMap,
        field: &FieldDef,
    ) -> Result<Vec<i64>, OrmError> {
        match field.field_type {
            FieldType::Many2One | FieldType::One2One => {
                Ok(record.get(&field.json).and_then(cast_to_integer).into_iter().collect())
            }
            FieldType::Many2Many => Ok(ids_of(record.get(&field.json).unwrap_or(&Value::Null))),
            FieldType::One2Many => {
                let fk = field.reverse_fk.as_deref().ok_or_else(|| {
                    OrmError::InvalidValue(format!(
                        "one2many '{}' of {} has no reverse field",
                        field.json, model.name
                    ))
                })?;
                let id = record_id(record);
                let rows = self.records_of(field.relation_model()?)?;
                Ok(rows
                    .iter()
                    .filter(|r| r.get(fk).and_then(cast_to_integer) == Some(id))
                    .map(record_id)
                    .collect())
            }
            _ => Ok(Vec::new()),
        }
    }

    fn display_names(&self, model: &str, ids: &[i64]) -> Result<Vec<String>, OrmError> {
        let def = self.env.model(model)?;
        let rows = self.records_of(model)?;
        Ok(rows
            .iter()
            .filter(|r| ids.contains(&record_id(r)))
            .map(|r| def.display_name(r))
            .collect())
    }

    /// `roots` and every record below them through `parent_id`.
    fn descendants(&self, model: &str, roots: &Value) -> Result<HashSet<i64>, OrmError> {
        let mut found: HashSet<i64> = ids_of(roots).into_iter().collect();
        let rows = self.records_of(model)?;
        loop {
            let before = found.len();
            for row in rows.iter() {
                let parent = row.get("parent_id").and_then(cast_to_integer);
                if parent.is_some_and(|p| found.contains(&p)) {
                    found.insert(record_id(row));
                }
            }
            if found.len() == before {
                return Ok(found);
            }
        }
    }
}

pub(crate) fn record_id(record: &FieldMap) -> i64 {
    record.get(magic::ID).and_then(cast_to_integer).unwrap_or_default()
}

/// Ids in a value: a single id, a list of ids, or a `[id, name]` pair.
pub(crate) fn ids_of(value: &Value) -> Vec<i64> {
    match value {
        Value::Array(items) => match items.as_slice() {
            [id, Value::String(_)] => cast_to_integer(id).into_iter().collect(),
            _ => items.iter().filter_map(cast_to_integer).collect(),
        },
        other => cast_to_integer(other).into_iter().collect(),
    }
}

/// Null and `false` both mean "no value".
pub(crate) fn is_unset(v: &Value) -> bool {
    matches!(v, Value::Null | Value::Bool(false))
}

fn positive_of(op: Operator) -> Operator {
    match op {
        Operator::NotEquals => Operator::Equals,
        Operator::NotContains => Operator::Contains,
        Operator::NotIContains => Operator::IContains,
        Operator::NotIn => Operator::In,
        other => other,
    }
}

/// Compare a stored scalar with a condition value.
pub(crate) fn compare(field_type: FieldType, lhs: &Value, op: Operator, rhs: &Value) -> bool {
    if op.is_negative() && op != Operator::IsNotNull {
        return !compare(field_type, lhs, positive_of(op), rhs);
    }
    let unset = is_unset(lhs) && !(field_type == FieldType::Boolean && lhs == &Value::Bool(false));
    match op {
        Operator::IsNull => is_unset(lhs),
        Operator::IsNotNull => !is_unset(lhs),
        Operator::Equals => {
            if field_type == FieldType::Boolean {
                return truthy(lhs) == truthy(rhs);
            }
            if is_unset(rhs) {
                return is_unset(lhs);
            }
            values_equal(lhs, rhs)
        }
        Operator::In => match rhs {
            Value::Array(items) => items
                .iter()
                .any(|item| compare(field_type, lhs, Operator::Equals, item)),
            other => compare(field_type, lhs, Operator::Equals, other),
        },
        Operator::Greater | Operator::GreaterOrEqual | Operator::Lower | Operator::LowerOrEqual => {
            if unset || is_unset(rhs) {
                return false;
            }
            let Some(ord) = order_values(lhs, rhs) else {
                return false;
            };
            match op {
                Operator::Greater => ord == Ordering::Greater,
                Operator::GreaterOrEqual => ord != Ordering::Less,
                Operator::Lower => ord == Ordering::Less,
                _ => ord != Ordering::Greater,
            }
        }
        Operator::Contains | Operator::IContains | Operator::Like | Operator::ILike => {
            if unset {
                return false;
            }
            let text = as_text(lhs);
            let pattern = as_text(rhs);
            match op {
                Operator::Contains => text.contains(&pattern),
                Operator::IContains => text.to_lowercase().contains(&pattern.to_lowercase()),
                Operator::Like => like_match(&text, &pattern),
                _ => like_match(&text.to_lowercase(), &pattern.to_lowercase()),
            }
        }
        // Negative operators are handled above; child_of needs relations.
        _ => false,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => lhs == rhs,
    }
}

fn as_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Total order used for comparisons and sorting. Unset values come first.
pub(crate) fn order_values(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (is_unset(lhs), is_unset(rhs)) {
        (true, true) => return Some(Ordering::Equal),
        (true, false) => return Some(Ordering::Less),
        (false, true) => return Some(Ordering::Greater),
        _ => {}
    }
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// SQL `LIKE` matching: `%` is any run of characters, `_` any single one.
pub(crate) fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    // reach[j]: the first i characters of text match the first j of pattern.
    let mut reach = vec![false; p.len() + 1];
    reach[0] = true;
    for j in 1..=p.len() {
        reach[j] = reach[j - 1] && p[j - 1] == '%';
    }
    for c in &t {
        let mut next = vec![false; p.len() + 1];
        for j in 1..=p.len() {
            next[j] = match p[j - 1] {
                '%' => next[j - 1] || reach[j],
                '_' => reach[j - 1],
                pc => reach[j - 1] && pc == *c,
            };
        }
        reach = next;
    }
    reach[p.len()]
}

/// Parse an order clause: `"name desc, id"` → `[("name", true), ("id", false)]`.
pub(crate) fn parse_order(order: &str) -> Vec<(String, bool)> {
    order
        .split(',')
        .filter_map(|part| {
            let mut words = part.split_whitespace();
            let field = words.next()?;
            let desc = words.next().is_some_and(|w| w.eq_ignore_ascii_case("desc"));
            Some((field.to_string(), desc))
        })
        .collect()
}

/// Sort records by `order`, then by id.
pub(crate) fn sort_records(model: &ModelDef, records: &mut [FieldMap], order: &str) {
    let keys: Vec<(String, bool)> = parse_order(order)
        .into_iter()
        .filter_map(|(name, desc)| model.field(&name).map(|f| (f.json.clone(), desc)))
        .collect();
    records.sort_by(|a, b| {
        for (field, desc) in &keys {
            let (va, vb) = if field == magic::DISPLAY_NAME {
                (Value::String(model.display_name(a)), Value::String(model.display_name(b)))
            } else {
                (
                    sort_key(a.get(field).unwrap_or(&Value::Null)),
                    sort_key(b.get(field).unwrap_or(&Value::Null)),
                )
            };
            let ord = order_values(&va, &vb).unwrap_or(Ordering::Equal);
            let ord = if *desc { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        record_id(a).cmp(&record_id(b))
    });
}

/// Lists (many2many ids) sort by their length.
fn sort_key(v: &Value) -> Value {
    match v {
        Value::Array(items) => Value::from(items.len()),
        other => other.clone(),
    }
}
