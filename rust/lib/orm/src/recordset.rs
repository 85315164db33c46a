use std::fmt;
use std::sync::Arc;

use hexya_core::{cast_to_integer, now_rfc3339, RecordRef};
use hexya_domain::{Condition, Operator};
use indexmap::IndexMap;
use serde_json::Value;

use crate::context::Context;
use crate::data::{FieldInfo, FieldMap, OnchangeParams, OnchangeResult, OnchangeValues, RecordData};
use crate::env::Environment;
use crate::error::OrmError;
use crate::fields::{magic, FieldDef, FieldType};
use crate::method::{Arg, CallResult, MethodDescriptor};
use crate::model::ModelDef;
use crate::search::{ids_of, is_unset, record_id, sort_records, Evaluator, SearchQuery};

/// Context key disabling constraint checks in `create` and `write`.
pub const SKIP_CHECK_CONSTRAINTS: &str = "skip_check_constraints";

/// An ordered set of records of one model, bound to an environment.
#[derive(Clone)]
pub struct RecordSet {
    env: Environment,
    model: Arc<ModelDef>,
    ids: Vec<i64>,
}

impl RecordSet {
    pub(crate) fn new(env: Environment, model: Arc<ModelDef>, ids: Vec<i64>) -> Self {
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { env, model, ids: unique }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn model(&self) -> &ModelDef {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        &self.model.name
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Id of the first record, or 0 for an empty set.
    pub fn id(&self) -> i64 {
        self.ids.first().copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// One singleton record set per record.
    pub fn records(&self) -> Vec<RecordSet> {
        self.ids.iter().map(|id| self.browse(&[*id])).collect()
    }

    pub fn browse(&self, ids: &[i64]) -> RecordSet {
        RecordSet::new(self.env.clone(), self.model.clone(), ids.to_vec())
    }

    pub fn browse_one(&self, id: i64) -> RecordSet {
        self.browse(&[id])
    }

    pub fn union(&self, other: &RecordSet) -> RecordSet {
        let mut ids = self.ids.clone();
        ids.extend_from_slice(&other.ids);
        self.browse(&ids)
    }

    pub fn subtract(&self, other: &RecordSet) -> RecordSet {
        let ids: Vec<i64> = self.ids.iter().copied().filter(|id| !other.ids.contains(id)).collect();
        self.browse(&ids)
    }

    /// Same records with one extra context key.
    pub fn with_context(&self, key: &str, value: impl Into<Value>) -> RecordSet {
        let ctx = self.env.context().with_key(key, value);
        self.with_new_context(ctx)
    }

    pub fn with_new_context(&self, context: Context) -> RecordSet {
        RecordSet {
            env: self.env.with_context(context),
            model: self.model.clone(),
            ids: self.ids.clone(),
        }
    }

    pub fn ensure_one(&self) -> Result<(), OrmError> {
        match self.ids.len() {
            1 => Ok(()),
            n => Err(OrmError::InvalidValue(format!(
                "expected singleton of {}, got {} records",
                self.model.name, n
            ))),
        }
    }

    pub fn method_descriptor(&self, method: &str) -> Result<&MethodDescriptor, OrmError> {
        self.model
            .method(method)
            .map(|m| &m.descriptor)
            .ok_or_else(|| OrmError::UnknownMethod {
                model: self.model.name.clone(),
                method: method.to_string(),
            })
    }

    /// Call a registered method on this record set.
    pub fn call(&self, method: &str, args: Vec<Arg>) -> Result<CallResult, OrmError> {
        let def = self.model.method(method).ok_or_else(|| OrmError::UnknownMethod {
            model: self.model.name.clone(),
            method: method.to_string(),
        })?;
        tracing::trace!(model = %self.model.name, method, ids = ?self.ids, "call");
        (def.handler)(self, args)
    }

    /// Records of this model matching `cond`, in model order.
    ///
    /// Searches the whole model; the records already in the set do not
    /// restrict the result.
    pub fn search(&self, cond: &Condition) -> Result<RecordSet, OrmError> {
        self.search_query(&SearchQuery::new(cond.clone()))
    }

    pub fn search_all(&self) -> Result<RecordSet, OrmError> {
        self.search(&Condition::All)
    }

    pub fn search_query(&self, query: &SearchQuery) -> Result<RecordSet, OrmError> {
        let mut rows = self.matching_rows(&query.cond)?;
        let order = query.order.as_deref().unwrap_or(&self.model.order);
        sort_records(&self.model, &mut rows, order);
        let ids: Vec<i64> = rows
            .iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(record_id)
            .collect();
        Ok(self.browse(&ids))
    }

    pub fn search_count(&self, cond: &Condition) -> Result<usize, OrmError> {
        Ok(self.matching_rows(cond)?.len())
    }

    fn matching_rows(&self, cond: &Condition) -> Result<Vec<FieldMap>, OrmError> {
        let eval = Evaluator::new(&self.env);
        let mut out = Vec::new();
        for row in self.env.load_all(&self.model.name)? {
            if eval.matches(&self.model, &row, cond)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    /// The records of this set that are actually stored.
    pub fn exists(&self) -> Result<RecordSet, OrmError> {
        let mut ids = Vec::new();
        for id in &self.ids {
            if self.env.load(&self.model.name, *id)?.is_some() {
                ids.push(*id);
            }
        }
        Ok(self.browse(&ids))
    }

    fn load_row(&self, id: i64) -> Result<FieldMap, OrmError> {
        self.env.load(&self.model.name, id)?.ok_or_else(|| {
            OrmError::NotFound(format!("record {} of {} does not exist", id, self.model.name))
        })
    }

    /// Value of `field` on the single record of the set, in read form.
    pub fn get(&self, field: &str) -> Result<Value, OrmError> {
        self.ensure_one()?;
        let def = self.model.field_or_err(field)?;
        let row = self.load_row(self.id())?;
        self.render_value(&Evaluator::new(&self.env), &row, def)
    }

    /// Read `fields` (all fields when empty) of every record.
    ///
    /// To-one fields come back as an id or `false`, to-many fields as a
    /// list of ids. Unknown fields are skipped.
    pub fn read(&self, fields: &[String]) -> Result<Vec<RecordData>, OrmError> {
        let eval = Evaluator::new(&self.env);
        let defs: Vec<&FieldDef> = if fields.is_empty() {
            self.model.fields.values().collect()
        } else {
            fields
                .iter()
                .filter_map(|name| {
                    let def = self.model.field(name);
                    if def.is_none() {
                        tracing::debug!(
                            model = %self.model.name,
                            field = %name,
                            "read of unknown field skipped"
                        );
                    }
                    def
                })
                .collect()
        };
        let mut out = Vec::with_capacity(self.ids.len());
        for id in &self.ids {
            let row = self.load_row(*id)?;
            let mut data = RecordData::new(&self.model.name);
            data.set(magic::ID, Value::from(*id));
            for def in &defs {
                data.set(def.json.clone(), self.render_value(&eval, &row, def)?);
            }
            out.push(data);
        }
        Ok(out)
    }

    fn render_value(
        &self,
        eval: &Evaluator<'_>,
        row: &FieldMap,
        def: &FieldDef,
    ) -> Result<Value, OrmError> {
        let value = match def.json.as_str() {
            magic::ID => Value::from(record_id(row)),
            magic::DISPLAY_NAME => Value::String(self.model.display_name(row)),
            magic::LAST_UPDATE => row.get(magic::WRITE_DATE).cloned().unwrap_or(Value::Bool(false)),
            _ => match def.field_type {
                FieldType::Many2One | FieldType::One2One => {
                    match row.get(&def.json).and_then(cast_to_integer) {
                        Some(id) if id != 0 => Value::from(id),
                        _ => Value::Bool(false),
                    }
                }
                FieldType::One2Many | FieldType::Many2Many => {
                    Value::from(eval.related_ids(&self.model, row, def)?)
                }
                _ => match row.get(&def.json) {
                    Some(v) if !v.is_null() => v.clone(),
                    _ => def.field_type.empty_value(),
                },
            },
        };
        Ok(value)
    }

    /// Display name of the first record.
    pub fn name_get(&self) -> Result<String, OrmError> {
        if self.is_empty() {
            return Ok(String::new());
        }
        Ok(self.model.display_name(&self.load_row(self.id())?))
    }

    /// `[id, display name]` of every record.
    pub fn display_names(&self) -> Result<Vec<RecordRef>, OrmError> {
        self.ids
            .iter()
            .map(|id| -> Result<RecordRef, OrmError> {
                Ok(RecordRef::new(*id, self.model.display_name(&self.load_row(*id)?)))
            })
            .collect()
    }

    /// Field descriptions, all fields when `fields` is empty.
    pub fn fields_get(&self, fields: &[String]) -> IndexMap<String, FieldInfo> {
        let defs: Vec<&FieldDef> = if fields.is_empty() {
            self.model.fields.values().collect()
        } else {
            fields.iter().filter_map(|f| self.model.field(f)).collect()
        };
        defs.into_iter()
            .map(|f| {
                let info = FieldInfo {
                    name: f.json.clone(),
                    field_type: f.field_type,
                    string: f.label.clone(),
                    help: f.help.clone(),
                    required: f.required,
                    readonly: f.readonly,
                    store: f.stored,
                    sortable: f.stored,
                    searchable: f.stored
                        || f.field_type.is_relation()
                        || f.json == magic::DISPLAY_NAME,
                    relation: f.relation.clone(),
                    relation_field: f.reverse_fk.clone(),
                    selection: f.selection.clone(),
                    domain: Value::Null,
                    filter: f.filter.clone(),
                };
                (f.json.clone(), info)
            })
            .collect()
    }

    /// Default values of `fields` (all fields when empty).
    ///
    /// To-one defaults are returned as `[id, name]`.
    pub fn default_get(&self, fields: &[String]) -> Result<RecordData, OrmError> {
        let mut data = RecordData::new(&self.model.name);
        let defs: Vec<&FieldDef> = if fields.is_empty() {
            self.model.fields.values().collect()
        } else {
            fields.iter().filter_map(|f| self.model.field(f)).collect()
        };
        for def in defs {
            if def.is_magic() {
                continue;
            }
            let value = match &def.default {
                Some(default) => default.eval(&self.env)?,
                None if def.field_type == FieldType::Boolean => Value::Bool(false),
                None => continue,
            };
            let value = match (def.field_type.is_to_one(), cast_to_integer(&value)) {
                (true, Some(id)) if id != 0 => {
                    let target = self.env.browse(def.relation_model()?, &[id])?;
                    serde_json::to_value(RecordRef::new(id, target.name_get()?))
                        .unwrap_or(Value::Bool(false))
                }
                _ => value,
            };
            data.set(def.json.clone(), value);
        }
        Ok(data)
    }

    /// Create one record from `data` and return it.
    ///
    /// Missing fields get their default. One2many values are lists of
    /// existing record ids to attach. Constraints are checked unless the
    /// context sets `skip_check_constraints`.
    pub fn create(&self, data: &RecordData) -> Result<RecordSet, OrmError> {
        let mut values = FieldMap::new();
        let mut o2m: Vec<(&FieldDef, Vec<i64>)> = Vec::new();
        for (key, value) in &data.fields {
            let def = self.model.field_or_err(key)?;
            if def.is_magic() {
                continue;
            }
            if def.field_type == FieldType::One2Many {
                o2m.push((def, self.to_many_ids(def, value)?));
                continue;
            }
            values.insert(def.json.clone(), self.normalize(def, value)?);
        }
        for def in self.model.stored_fields() {
            if def.is_magic() || values.contains_key(&def.json) {
                continue;
            }
            if let Some(default) = &def.default {
                let value = default.eval(&self.env)?;
                values.insert(def.json.clone(), self.normalize(def, &value)?);
            }
        }

        let id = self.env.next_id(&self.model.name)?;
        let now = now_rfc3339();
        values.insert(magic::ID.to_string(), Value::from(id));
        values.insert(magic::CREATE_DATE.to_string(), Value::String(now.clone()));
        values.insert(magic::WRITE_DATE.to_string(), Value::String(now));
        self.env.save(&self.model.name, id, &values)?;

        for (def, ids) in o2m {
            self.set_one2many(id, def, &ids)?;
        }

        let created = self.browse_one(id);
        tracing::debug!(model = %self.model.name, id, "record created");
        if !self.env.context().get_bool(SKIP_CHECK_CONSTRAINTS) {
            created.check_constraints_for(&[])?;
        }
        Ok(created)
    }

    /// Store a record with a given id, as seed data does.
    pub(crate) fn insert_with_id(&self, id: i64, data: &RecordData) -> Result<RecordSet, OrmError> {
        self.env.reserve_id(&self.model.name, id)?;
        let mut values = FieldMap::new();
        for def in self.model.stored_fields() {
            if def.is_magic() {
                continue;
            }
            if let Some(value) = data.get(&def.json) {
                values.insert(def.json.clone(), self.normalize(def, value)?);
            } else if let Some(default) = &def.default {
                values.insert(def.json.clone(), self.normalize(def, &default.eval(&self.env)?)?);
            }
        }
        for key in data.keys() {
            self.model.field_or_err(key)?;
        }
        let now = now_rfc3339();
        values.insert(magic::ID.to_string(), Value::from(id));
        values.insert(magic::CREATE_DATE.to_string(), Value::String(now.clone()));
        values.insert(magic::WRITE_DATE.to_string(), Value::String(now));
        self.env.save(&self.model.name, id, &values)?;
        Ok(self.browse_one(id))
    }

    /// Update every record of the set with `data`.
    pub fn write(&self, data: &RecordData) -> Result<bool, OrmError> {
        let mut changed = Vec::new();
        for key in data.keys() {
            let def = self.model.field_or_err(key)?;
            if !def.is_magic() {
                changed.push(def.json.clone());
            }
        }
        for id in &self.ids {
            let mut row = self.load_row(*id)?;
            for (key, value) in &data.fields {
                let def = self.model.field_or_err(key)?;
                if def.is_magic() {
                    continue;
                }
                if def.field_type == FieldType::One2Many {
                    let ids = self.to_many_ids(def, value)?;
                    self.set_one2many(*id, def, &ids)?;
                    continue;
                }
                row.insert(def.json.clone(), self.normalize(def, value)?);
            }
            row.insert(magic::WRITE_DATE.to_string(), Value::String(now_rfc3339()));
            self.env.save(&self.model.name, *id, &row)?;
        }
        tracing::debug!(
            model = %self.model.name,
            ids = ?self.ids,
            fields = ?changed,
            "records written"
        );
        if !self.env.context().get_bool(SKIP_CHECK_CONSTRAINTS) {
            self.check_constraints_for(&changed)?;
        }
        Ok(true)
    }

    /// Delete every record of the set.
    ///
    /// To-one fields pointing to a deleted record are cleared and the
    /// record is removed from many2many lists.
    pub fn unlink(&self) -> Result<bool, OrmError> {
        if self.is_empty() {
            return Ok(true);
        }
        for id in &self.ids {
            self.env.remove(&self.model.name, *id)?;
        }
        for other_name in self.env.registry().model_names() {
            let other = self.env.model(other_name)?;
            let refs: Vec<&FieldDef> = other
                .stored_fields()
                .filter(|f| {
                    f.field_type.is_relation()
                        && f.relation.as_deref() == Some(self.model.name.as_str())
                })
                .collect();
            if refs.is_empty() {
                continue;
            }
            for mut row in self.env.load_all(other_name)? {
                let mut dirty = false;
                for f in &refs {
                    let Some(current) = row.get(&f.json) else { continue };
                    if f.field_type.is_to_one() {
                        if cast_to_integer(current).is_some_and(|v| self.ids.contains(&v)) {
                            row.insert(f.json.clone(), Value::Null);
                            dirty = true;
                        }
                    } else {
                        let kept: Vec<i64> = ids_of(current)
                            .into_iter()
                            .filter(|v| !self.ids.contains(v))
                            .collect();
                        if kept.len() != ids_of(current).len() {
                            row.insert(f.json.clone(), Value::from(kept));
                            dirty = true;
                        }
                    }
                }
                if dirty {
                    self.env.save(other_name, record_id(&row), &row)?;
                }
            }
        }
        tracing::debug!(model = %self.model.name, ids = ?self.ids, "records deleted");
        Ok(true)
    }

    /// Run required-field checks and every model constraint.
    pub fn check_constraints(&self) -> Result<(), OrmError> {
        self.check_constraints_for(&[])
    }

    /// Run the checks concerning `changed` fields; all checks when empty.
    fn check_constraints_for(&self, changed: &[String]) -> Result<(), OrmError> {
        let touched = |field: &str| changed.is_empty() || changed.iter().any(|c| c == field);
        for id in &self.ids {
            let row = self.load_row(*id)?;
            for def in self.model.stored_fields().filter(|f| f.required && !f.is_magic()) {
                if !touched(&def.json) {
                    continue;
                }
                let missing = match row.get(&def.json) {
                    None | Some(Value::Null) => true,
                    Some(v) if def.field_type != FieldType::Boolean => is_unset(v),
                    _ => false,
                };
                if missing {
                    return Err(OrmError::ConstraintViolation(format!(
                        "{}: field '{}' is required",
                        self.model.name, def.label
                    )));
                }
            }
        }
        for constraint in &self.model.constraints {
            if constraint.fields.is_empty() || constraint.fields.iter().any(|f| touched(f)) {
                tracing::trace!(
                    model = %self.model.name,
                    constraint = %constraint.name,
                    "checking constraint"
                );
                (constraint.check)(self)?;
            }
        }
        Ok(())
    }

    /// Run the onchange hooks of `field_name` over the form values.
    ///
    /// Only the values assigned by hooks are returned.
    pub fn onchange(&self, params: &OnchangeParams) -> Result<OnchangeResult, OrmError> {
        let mut values = OnchangeValues::new(params.values.fields.clone());
        for field in &params.field_name {
            let json = self.model.field(field).map(|f| f.json.as_str()).unwrap_or(field.as_str());
            for hook in self.model.onchanges.iter().filter(|h| {
                h.field == json || self.model.field(&h.field).is_some_and(|f| f.json == json)
            }) {
                (hook.hook)(self, &mut values)?;
            }
        }
        Ok(OnchangeResult {
            value: RecordData::from_map(&self.model.name, values.changes),
            warning: values.warning,
            filters: values.filters,
        })
    }

    /// Convert a client value to its stored form.
    fn normalize(&self, def: &FieldDef, value: &Value) -> Result<Value, OrmError> {
        let invalid = || {
            OrmError::InvalidValue(format!(
                "invalid value {} for {} field '{}' of {}",
                value,
                def.field_type.as_str(),
                def.json,
                self.model.name
            ))
        };
        if value.is_null() {
            return Ok(Value::Null);
        }
        match def.field_type {
            FieldType::Many2One | FieldType::One2One => {
                let id = match value {
                    Value::Bool(false) => return Ok(Value::Null),
                    Value::Array(_) => ids_of(value).first().copied().ok_or_else(invalid)?,
                    other => cast_to_integer(other).ok_or_else(invalid)?,
                };
                if id == 0 {
                    return Ok(Value::Null);
                }
                self.check_exists(def, &[id])?;
                Ok(Value::from(id))
            }
            FieldType::Many2Many => {
                let ids = self.to_many_ids(def, value)?;
                self.check_exists(def, &ids)?;
                Ok(Value::from(ids))
            }
            FieldType::One2Many => Err(invalid()),
            FieldType::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                _ => Err(invalid()),
            },
            FieldType::Integer => match value {
                Value::Bool(false) => Ok(Value::Null),
                other => cast_to_integer(other).map(Value::from).ok_or_else(invalid),
            },
            FieldType::Float => match value {
                Value::Bool(false) => Ok(Value::Null),
                Value::Number(_) => Ok(value.clone()),
                _ => Err(invalid()),
            },
            FieldType::Selection => match value {
                Value::Bool(false) => Ok(Value::Null),
                Value::String(s)
                    if def.selection.is_empty() || def.selection.iter().any(|(k, _)| k == s) =>
                {
                    Ok(value.clone())
                }
                _ => Err(invalid()),
            },
            _ => match value {
                Value::Bool(false) => Ok(Value::Null),
                Value::String(_) => Ok(value.clone()),
                _ => Err(invalid()),
            },
        }
    }

    /// Ids of a to-many value: a list of ids, or false for none.
    fn to_many_ids(&self, def: &FieldDef, value: &Value) -> Result<Vec<i64>, OrmError> {
        match value {
            Value::Null | Value::Bool(false) => Ok(Vec::new()),
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    cast_to_integer(v).ok_or_else(|| {
                        OrmError::InvalidValue(format!(
                            "field '{}' of {} expects a list of ids, got {}",
                            def.json, self.model.name, value
                        ))
                    })
                })
                .collect(),
            other => Err(OrmError::InvalidValue(format!(
                "field '{}' of {} expects a list of ids, got {}",
                def.json, self.model.name, other
            ))),
        }
    }

    fn check_exists(&self, def: &FieldDef, ids: &[i64]) -> Result<(), OrmError> {
        let target = def.relation_model()?;
        for id in ids {
            if self.env.load(target, *id)?.is_none() {
                return Err(OrmError::NotFound(format!(
                    "{} record {} referenced by '{}' does not exist",
                    target, id, def.json
                )));
            }
        }
        Ok(())
    }

    /// Make `ids` exactly the records of the one2many `def` of record
    /// `owner`, by pointing their reverse field at it.
    fn set_one2many(&self, owner: i64, def: &FieldDef, ids: &[i64]) -> Result<(), OrmError> {
        let target = def.relation_model()?;
        let fk = def.reverse_fk.as_deref().ok_or_else(|| {
            OrmError::InvalidValue(format!(
                "one2many '{}' of {} has no reverse field",
                def.json, self.model.name
            ))
        })?;
        for mut row in self.env.load_all(target)? {
            let id = record_id(&row);
            let linked = row.get(fk).and_then(cast_to_integer) == Some(owner);
            let wanted = ids.contains(&id);
            if linked != wanted {
                row.insert(fk.to_string(), if wanted { Value::from(owner) } else { Value::Null });
                self.env.save(target, id, &row)?;
            }
        }
        self.check_exists(def, ids)
    }
}

impl fmt::Debug for RecordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.model.name, self.ids)
    }
}

/// `id in ids` condition.
pub fn id_in(ids: &[i64]) -> Condition {
    Condition::leaf(magic::ID, Operator::In, Value::from(ids.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Orm;
    use crate::registry::Registry;
    use hexya_store::MemoryStore;
    use serde_json::json;

    fn email_has_at(rs: &RecordSet) -> Result<(), OrmError> {
        for rec in rs.records() {
            if let Value::String(email) = rec.get("email")? {
                if !email.contains('@') {
                    return Err(OrmError::ConstraintViolation(format!("invalid email: {}", email)));
                }
            }
        }
        Ok(())
    }

    fn company_type_hook(_rs: &RecordSet, values: &mut OnchangeValues) -> Result<(), OrmError> {
        let is_company = values.get("company_type") == Some(&json!("company"));
        values.set("is_company", json!(is_company));
        Ok(())
    }

    fn orm() -> Orm {
        let mut reg = Registry::new();
        reg.add_model(ModelDef::new("Country").with_field(FieldDef::char("Name").required()));
        reg.add_model(
            ModelDef::new("Partner")
                .with_order("name")
                .with_field(FieldDef::char("Name").required())
                .with_field(FieldDef::char("Email"))
                .with_field(FieldDef::boolean("IsCompany"))
                .with_field(FieldDef::boolean("Active").default_value(true))
                .with_field(FieldDef::selection(
                    "CompanyType",
                    &[("person", "Individual"), ("company", "Company")],
                ))
                .with_field(FieldDef::integer("Age"))
                .with_field(FieldDef::many2one("Country", "Country"))
                .with_field(FieldDef::many2one("Parent", "Partner"))
                .with_field(FieldDef::one2many("Children", "Partner", "parent_id"))
                .with_field(FieldDef::many2many("Tags", "Country").json("tag_ids"))
                .with_constraint("email", &["email"], email_has_at)
                .with_onchange("company_type", company_type_hook),
        );
        Orm::new(reg, Arc::new(MemoryStore::new()))
    }

    fn data(v: Value) -> RecordData {
        let map: FieldMap = serde_json::from_value(v).unwrap();
        RecordData::from_map("Partner", map)
    }

    fn run<T>(
        orm: &Orm,
        f: impl FnOnce(&Environment) -> Result<T, OrmError>,
    ) -> Result<T, OrmError> {
        orm.execute_in_new_environment(1, f)
    }

    #[test]
    fn create_and_read() {
        let orm = orm();
        let rows = run(&orm, |env| {
            let belgium = serde_json::from_value(json!({"name": "Belgium"})).unwrap();
            let country = env
                .pool("Country")?
                .create(&RecordData::from_map("Country", belgium))?;
            let partner = env
                .pool("Partner")?
                .create(&data(json!({"name": "Agrolait", "country_id": country.id(), "age": 3})))?;
            partner.read(&[
                "name".into(),
                "country_id".into(),
                "active".into(),
                "email".into(),
                "tag_ids".into(),
            ])
        })
        .unwrap();
        let row = &rows[0];
        assert_eq!(row.get("id"), Some(&json!(1)));
        assert_eq!(row.get("name"), Some(&json!("Agrolait")));
        assert_eq!(row.get("country_id"), Some(&json!(1)));
        assert_eq!(row.get("active"), Some(&json!(true)));
        assert_eq!(row.get("email"), Some(&json!(false)));
        assert_eq!(row.get("tag_ids"), Some(&json!([])));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let orm = orm();
        let err = run(&orm, |env| {
            env.pool("Partner")?
                .create(&data(json!({"name": "x", "nope": 1})))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::UnknownField { .. }));
    }

    #[test]
    fn required_field_and_skip_flag() {
        let orm = orm();
        let err = run(&orm, |env| {
            env.pool("Partner")?
                .create(&data(json!({"email": "a@b.c"})))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::ConstraintViolation(_)));

        let ok = run(&orm, |env| {
            let rs = env.pool("Partner")?.with_context(SKIP_CHECK_CONSTRAINTS, true);
            let created = rs.create(&data(json!({"email": "a@b.c"})))?;
            created.write(&data(json!({"name": "Filled"})))?;
            Ok(created.id())
        });
        assert!(ok.is_ok());
    }

    #[test]
    fn model_constraint_rolls_back() {
        let orm = orm();
        let err = run(&orm, |env| {
            env.pool("Partner")?.create(&data(json!({"name": "Ok", "email": "ok@example.com"})))?;
            env.pool("Partner")?.create(&data(json!({"name": "Bad", "email": "nope"})))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::ConstraintViolation(_)));
        let count = run(&orm, |env| env.pool("Partner")?.search_count(&Condition::All)).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn missing_foreign_key() {
        let orm = orm();
        let err = run(&orm, |env| {
            env.pool("Partner")?
                .create(&data(json!({"name": "x", "country_id": 99})))
        })
        .unwrap_err();
        assert!(matches!(err, OrmError::NotFound(_)));
    }

    #[test]
    fn one2many_through_reverse_field() {
        let orm = orm();
        let children = run(&orm, |env| {
            let pool = env.pool("Partner")?;
            let parent = pool.create(&data(json!({"name": "Parent"})))?;
            let a = pool.create(&data(json!({"name": "A"})))?;
            let b = pool.create(&data(json!({"name": "B"})))?;
            parent.write(&data(json!({"children_ids": [a.id(), b.id()]})))?;
            parent.write(&data(json!({"children_ids": [b.id()]})))?;
            Ok((parent.get("children_ids")?, a.get("parent_id")?, b.get("parent_id")?))
        })
        .unwrap();
        assert_eq!(children.0, json!([3]));
        assert_eq!(children.1, json!(false));
        assert_eq!(children.2, json!(1));
    }

    #[test]
    fn unlink_clears_references() {
        let orm = orm();
        let (parent_ref, tags) = run(&orm, |env| {
            let country = env.pool("Country")?.create(&RecordData::from_map(
                "Country",
                serde_json::from_value(json!({"name": "France"})).unwrap(),
            ))?;
            let pool = env.pool("Partner")?;
            let parent = pool.create(&data(json!({"name": "Parent"})))?;
            let child = pool.create(&data(json!({
                "name": "Child", "parent_id": parent.id(), "tag_ids": [country.id()]
            })))?;
            parent.unlink()?;
            country.unlink()?;
            Ok((child.get("parent_id")?, child.get("tag_ids")?))
        })
        .unwrap();
        assert_eq!(parent_ref, json!(false));
        assert_eq!(tags, json!([]));
    }

    #[test]
    fn search_with_paging_and_order() {
        let orm = orm();
        let (names, count) = run(&orm, |env| {
            let pool = env.pool("Partner")?;
            for (name, age) in [("Carol", 30), ("alice", 25), ("Bob", 40)] {
                pool.create(&data(json!({"name": name, "age": age})))?;
            }
            let q = SearchQuery::new(Condition::leaf("age", Operator::Greater, json!(20)))
                .order("age desc")
                .offset(1)
                .limit(Some(1));
            let found = pool.search_query(&q)?;
            let count =
                pool.search_count(&Condition::leaf("name", Operator::IContains, json!("o")))?;
            Ok((found.name_get()?, count))
        })
        .unwrap();
        assert_eq!(names, "Carol");
        assert_eq!(count, 2);
    }

    #[test]
    fn search_through_relations() {
        let orm = orm();
        let found = run(&orm, |env| {
            let country = env.pool("Country")?.create(&RecordData::from_map(
                "Country",
                serde_json::from_value(json!({"name": "Belgium"})).unwrap(),
            ))?;
            let pool = env.pool("Partner")?;
            let parent = pool.create(&data(json!({"name": "Parent", "country_id": country.id()})))?;
            pool.create(&data(json!({"name": "Child", "parent_id": parent.id()})))?;
            pool.create(&data(json!({"name": "Other"})))?;
            let by_path = pool.search(&Condition::leaf(
                "country_id.name",
                Operator::Equals,
                json!("Belgium"),
            ))?;
            let by_name =
                pool.search(&Condition::leaf("parent_id", Operator::IContains, json!("par")))?;
            let tree =
                pool.search(&Condition::leaf("id", Operator::ChildOf, json!([parent.id()])))?;
            let orphans =
                pool.search(&Condition::leaf("parent_id", Operator::Equals, json!(false)))?;
            Ok((by_path.ids().to_vec(), by_name.ids().to_vec(), tree.len(), orphans.len()))
        })
        .unwrap();
        assert_eq!(found.0, vec![1]);
        assert_eq!(found.1, vec![2]);
        assert_eq!(found.2, 2);
        assert_eq!(found.3, 2);
    }

    #[test]
    fn default_get_values() {
        let orm = orm();
        let defaults = run(&orm, |env| {
            env.pool("Partner")?
                .default_get(&["active".into(), "is_company".into(), "name".into()])
        })
        .unwrap();
        assert_eq!(defaults.get("active"), Some(&json!(true)));
        assert_eq!(defaults.get("is_company"), Some(&json!(false)));
        assert!(!defaults.contains("name"));
    }

    #[test]
    fn onchange_returns_assigned_values() {
        let orm = orm();
        let res = run(&orm, |env| {
            let params = OnchangeParams {
                values: data(json!({"name": "x", "company_type": "company", "is_company": false})),
                field_name: vec!["company_type".into()],
                field_onchange: json!({}),
            };
            env.pool("Partner")?.onchange(&params)
        })
        .unwrap();
        assert_eq!(res.value.fields.len(), 1);
        assert_eq!(res.value.get("is_company"), Some(&json!(true)));
    }

    #[test]
    fn fields_get_describes_relations() {
        let orm = orm();
        let infos =
            run(&orm, |env| Ok(env.pool("Partner")?.fields_get(&["children_ids".into()]))).unwrap();
        let info = &infos["children_ids"];
        assert_eq!(info.relation.as_deref(), Some("Partner"));
        assert_eq!(info.relation_field.as_deref(), Some("parent_id"));
        assert!(!info.store);
    }
}
