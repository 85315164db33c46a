//! Conversion of relation field values between the client's wire forms
//! and the ORM's.
//!
//! To-one values travel as `[id, name]` pairs towards the client and as
//! bare ids (or `false`) from it. To-many values arrive as lists of
//! action triplets `[code, id, payload]`:
//!
//! | code | one2many              | many2many          |
//! |------|-----------------------|--------------------|
//! | 0    | create and link       | create and link    |
//! | 1    | update linked record  | update record      |
//! | 2    | unlink and delete     | unlink and delete  |
//! | 3    | unlink                | unlink             |
//! | 4    | link existing         | link existing      |
//! | 5    | unlink all            | unlink all         |
//! | 6    | replace all           | replace all        |
//!
//! A `6` in a many2many list wins over every other triplet of that list.

use hexya_core::{cast_to_integer, RpcError};
use hexya_orm::{
    Arg, CallResult, FieldInfo, FieldType, OrmError, RecordData, RecordSet, SKIP_CHECK_CONSTRAINTS,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::cache::{FieldInfos, FieldsCache};

/// Replace to-one ids by `[id, name]` pairs and unset to-many values by
/// empty lists. Values already in pair form are kept.
pub fn add_names_to_relations(
    rs: &RecordSet,
    mut data: RecordData,
    infos: &FieldInfos,
) -> Result<RecordData, OrmError> {
    for (field, value) in data.fields.iter_mut() {
        let Some(info) = infos.get(field) else {
            continue;
        };
        if info.field_type.is_to_one() {
            *value = match to_one_id(value) {
                Some(ToOne::Pair) => continue,
                Some(ToOne::Id(id)) => {
                    let relation = info.relation.as_deref().unwrap_or_default();
                    let related = rs.env().browse(relation, &[id])?.exists()?;
                    if related.is_empty() {
                        Value::Bool(false)
                    } else {
                        json!([id, related.name_get()?])
                    }
                }
                None => Value::Bool(false),
            };
        } else if info.field_type.is_to_many() && !value.is_array() {
            *value = json!([]);
        }
    }
    Ok(data)
}

/// Normalize relation values of data returned to the client without
/// looking up names: to-one ids stay ids, unset to-one values become
/// `false` and unset to-many values become `[]`.
pub fn format_relation_fields(mut data: RecordData, infos: &FieldInfos) -> RecordData {
    for (field, value) in data.fields.iter_mut() {
        let Some(info) = infos.get(field) else {
            continue;
        };
        if info.field_type.is_to_one() {
            match to_one_id(value) {
                Some(ToOne::Pair) => {}
                Some(ToOne::Id(id)) => *value = Value::from(id),
                None => *value = Value::Bool(false),
            }
        } else if info.field_type.is_to_many() && !value.is_array() {
            *value = json!([]);
        }
    }
    data
}

enum ToOne {
    Id(i64),
    Pair,
}

fn to_one_id(value: &Value) -> Option<ToOne> {
    match value {
        Value::Array(items) if items.len() == 2 && items[1].is_string() => Some(ToOne::Pair),
        other => cast_to_integer(other).filter(|id| *id != 0).map(ToOne::Id),
    }
}

/// Create a record from client values.
///
/// To-many values are written after the record exists so that one2many
/// triplets can point back to it. Constraints are checked once all values
/// are in place.
pub fn create_with_relations(
    cache: &FieldsCache,
    rs: &RecordSet,
    data: RecordData,
) -> Result<RecordSet, RpcError> {
    let (values, deferred) = process_create_values(cache, rs, data)?;
    let unchecked = rs.with_context(SKIP_CHECK_CONSTRAINTS, true);
    let created = match unchecked.call("Create", vec![Arg::Data(values)])? {
        CallResult::Collection(created) => created,
        other => return Err(RpcError::Internal(format!("Create returned {:?}", other))),
    };
    post_process_create_values(cache, &created, deferred)?;
    created.with_context(SKIP_CHECK_CONSTRAINTS, false).check_constraints()?;
    Ok(created.with_new_context(rs.env().context().clone()))
}

/// Split client values of a new record into the values to create it with
/// and the to-many values to write once it exists.
pub fn process_create_values(
    cache: &FieldsCache,
    rs: &RecordSet,
    data: RecordData,
) -> Result<(RecordData, RecordData), RpcError> {
    let infos = cache.get(rs);
    let mut values = RecordData::new(rs.model_name());
    let mut deferred = RecordData::new(rs.model_name());
    for (field, value) in data.fields {
        let info = field_info(&infos, rs, &field)?;
        if info.field_type.is_to_many() {
            deferred.set(field, value);
            continue;
        }
        let value = match info.field_type {
            t if t.is_to_one() => to_one_write_value(&field, value)?,
            FieldType::Integer => integer_value(value),
            _ => value,
        };
        values.set(field, value);
    }
    Ok((values, deferred))
}

/// Write the to-many values held back by [`process_create_values`].
pub fn post_process_create_values(
    cache: &FieldsCache,
    rs: &RecordSet,
    deferred: RecordData,
) -> Result<(), RpcError> {
    if deferred.is_empty() {
        return Ok(());
    }
    let infos = cache.get(rs);
    let mut values = RecordData::new(rs.model_name());
    for (field, value) in deferred.fields {
        let info = field_info(&infos, rs, &field)?;
        let value = match info.field_type {
            FieldType::Many2Many => normalize_m2m_data(cache, rs, info, &value)?,
            FieldType::One2Many => execute_o2m_actions(cache, rs, info, &value)?,
            _ => value,
        };
        values.set(field, value);
    }
    rs.write(&values)?;
    Ok(())
}

/// Convert client values of a write into ORM values, running to-many
/// triplets on the way.
pub fn process_write_values(
    cache: &FieldsCache,
    rs: &RecordSet,
    data: RecordData,
) -> Result<RecordData, RpcError> {
    let infos = cache.get(rs);
    let mut values = RecordData::new(rs.model_name());
    for (field, value) in data.fields {
        let info = field_info(&infos, rs, &field)?;
        let value = match info.field_type {
            t if t.is_to_one() => to_one_write_value(&field, value)?,
            FieldType::Many2Many => normalize_m2m_data(cache, rs, info, &value)?,
            FieldType::One2Many => execute_o2m_actions(cache, rs, info, &value)?,
            FieldType::Integer => integer_value(value),
            _ => value,
        };
        values.set(field, value);
    }
    Ok(values)
}

/// Convert form values of an onchange call. Nothing is written: to-many
/// triplets only give the ids the field would hold, and records that
/// would be created are left out.
pub fn process_onchange_values(
    cache: &FieldsCache,
    rs: &RecordSet,
    data: RecordData,
) -> Result<RecordData, RpcError> {
    let infos = cache.get(rs);
    let mut values = RecordData::new(rs.model_name());
    for (field, value) in data.fields {
        // Forms send fields the model may not declare, such as parent
        // fields of embedded views.
        let Some(info) = infos.get(&field) else {
            debug!("onchange: ignoring unknown field {}.{}", rs.model_name(), field);
            continue;
        };
        let value = match info.field_type {
            t if t.is_to_one() => to_one_write_value(&field, value)?,
            t if t.is_to_many() => preview_to_many(&value)?,
            FieldType::Integer => integer_value(value),
            _ => value,
        };
        values.set(field, value);
    }
    Ok(values)
}

/// Run the one2many triplets of `value` and return the ids the field must
/// hold afterwards. Values that are not triplet lists are returned as is.
pub fn execute_o2m_actions(
    cache: &FieldsCache,
    rs: &RecordSet,
    info: &FieldInfo,
    value: &Value,
) -> Result<Value, RpcError> {
    let Some(triplets) = triplet_list(value)? else {
        return Ok(value.clone());
    };
    if triplets.is_empty() {
        return Ok(json!([]));
    }
    let related = rs.env().pool(relation_of(info)?)?.with_new_context(rs.env().context().clone());
    let mut ids = current_ids(rs, info)?;
    for t in triplets {
        match t.code {
            0 => {
                let mut data = payload_data(&related, &t.payload);
                if let Some(fk) = &info.relation_field {
                    data.set(fk.clone(), Value::from(rs.id()));
                }
                let created = create_with_relations(cache, &related, data)?;
                ids.push(created.id());
            }
            1 => {
                let target = related.browse_one(t.id).exists()?;
                let payload = payload_data(&related, &t.payload);
                let data = process_write_values(cache, &target, payload)?;
                target.write(&data)?;
                push_unique(&mut ids, t.id);
            }
            2 => {
                ids.retain(|id| *id != t.id);
                related.browse_one(t.id).exists()?.unlink()?;
            }
            3 => ids.retain(|id| *id != t.id),
            4 => push_unique(&mut ids, t.id),
            5 => ids.clear(),
            _ => ids = t.replacement_ids()?,
        }
    }
    Ok(Value::from(ids))
}

/// Run the many2many triplets of `value` and return the ids the field
/// must hold afterwards. A replace triplet short-circuits the list.
pub fn normalize_m2m_data(
    cache: &FieldsCache,
    rs: &RecordSet,
    info: &FieldInfo,
    value: &Value,
) -> Result<Value, RpcError> {
    let Some(triplets) = triplet_list(value)? else {
        return Ok(value.clone());
    };
    if triplets.is_empty() {
        return Ok(json!([]));
    }
    if let Some(replace) = triplets.iter().find(|t| t.code == 6) {
        return Ok(Value::from(replace.replacement_ids()?));
    }
    let related = rs.env().pool(relation_of(info)?)?.with_new_context(rs.env().context().clone());
    let mut ids = current_ids(rs, info)?;
    for t in triplets {
        match t.code {
            0 => {
                let payload = payload_data(&related, &t.payload);
                let created = create_with_relations(cache, &related, payload)?;
                ids.push(created.id());
            }
            1 => {
                let target = related.browse_one(t.id).exists()?;
                let payload = payload_data(&related, &t.payload);
                let data = process_write_values(cache, &target, payload)?;
                target.write(&data)?;
            }
            2 => {
                ids.retain(|id| *id != t.id);
                related.browse_one(t.id).exists()?.unlink()?;
            }
            3 => ids.retain(|id| *id != t.id),
            4 => push_unique(&mut ids, t.id),
            _ => ids.clear(),
        }
    }
    Ok(Value::from(ids))
}

/// Ids a to-many field would hold after its triplets, without side
/// effects.
fn preview_to_many(value: &Value) -> Result<Value, RpcError> {
    let Some(triplets) = triplet_list(value)? else {
        return Ok(match value {
            Value::Array(_) => value.clone(),
            _ => json!([]),
        });
    };
    let mut ids = Vec::new();
    for t in triplets {
        match t.code {
            0 => {}
            1 | 4 => push_unique(&mut ids, t.id),
            2 | 3 => ids.retain(|id| *id != t.id),
            5 => ids.clear(),
            _ => ids = t.replacement_ids()?,
        }
    }
    Ok(Value::from(ids))
}

#[derive(Debug)]
struct Triplet {
    code: i64,
    id: i64,
    payload: Value,
}

impl Triplet {
    fn parse(v: &Value) -> Result<Triplet, RpcError> {
        let items = v
            .as_array()
            .filter(|items| !items.is_empty())
            .ok_or_else(|| RpcError::ActionTriplet(format!("invalid action triplet {}", v)))?;
        let code = cast_to_integer(&items[0])
            .filter(|code| (0..=6).contains(code))
            .ok_or_else(|| RpcError::ActionTriplet(format!("unknown action code {}", items[0])))?;
        let id = items.get(1).and_then(cast_to_integer).unwrap_or_default();
        let payload = items.get(2).cloned().unwrap_or(Value::Bool(false));
        Ok(Triplet { code, id, payload })
    }

    fn replacement_ids(&self) -> Result<Vec<i64>, RpcError> {
        match &self.payload {
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    cast_to_integer(v).ok_or_else(|| {
                        RpcError::ActionTriplet(format!("invalid id {} in replace action", v))
                    })
                })
                .collect(),
            Value::Null | Value::Bool(false) => Ok(Vec::new()),
            other => Err(RpcError::ActionTriplet(format!(
                "replace action expects a list of ids, got {}",
                other
            ))),
        }
    }
}

/// Parse a list of triplets. Returns `None` for values that are not
/// triplet lists, such as a plain list of ids.
fn triplet_list(value: &Value) -> Result<Option<Vec<Triplet>>, RpcError> {
    let Value::Array(items) = value else {
        return Ok(None);
    };
    if items.iter().any(|item| !item.is_array()) {
        return Ok(None);
    }
    items.iter().map(Triplet::parse).collect::<Result<Vec<_>, _>>().map(Some)
}

fn field_info<'a>(
    infos: &'a FieldInfos,
    rs: &RecordSet,
    field: &str,
) -> Result<&'a FieldInfo, OrmError> {
    infos
        .get(field)
        .ok_or_else(|| OrmError::unknown_field(rs.model_name(), field))
}

fn relation_of(info: &FieldInfo) -> Result<&str, OrmError> {
    info.relation
        .as_deref()
        .ok_or_else(|| OrmError::InvalidValue(format!("field '{}' has no relation", info.name)))
}

/// Ids currently held by the field, when `rs` is a single record.
fn current_ids(rs: &RecordSet, info: &FieldInfo) -> Result<Vec<i64>, OrmError> {
    if rs.len() != 1 {
        return Ok(Vec::new());
    }
    Ok(match rs.get(&info.name)? {
        Value::Array(items) => items.iter().filter_map(cast_to_integer).collect(),
        _ => Vec::new(),
    })
}

fn payload_data(related: &RecordSet, payload: &Value) -> RecordData {
    match payload {
        Value::Object(map) => {
            RecordData::from_map(related.model_name(), map.clone().into_iter().collect())
        }
        _ => RecordData::new(related.model_name()),
    }
}

fn push_unique(ids: &mut Vec<i64>, id: i64) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn to_one_write_value(field: &str, value: Value) -> Result<Value, RpcError> {
    let raw = match value {
        Value::Null | Value::Bool(false) => return Ok(Value::Null),
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Null),
        other => other,
    };
    let id = cast_to_integer(&raw).ok_or_else(|| {
        RpcError::TypeMismatch(format!(
            "Unable to cast value {} of field '{}' to a record id",
            raw, field
        ))
    })?;
    Ok(if id == 0 { Value::Null } else { Value::from(id) })
}

fn integer_value(value: Value) -> Value {
    match cast_to_integer(&value) {
        Some(i) if value.is_number() || value.is_string() => Value::from(i),
        _ => value,
    }
}
