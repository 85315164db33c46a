//! Methods whose wire form differs from the ORM call.
//!
//! An adapter receives the bound arguments of the call and runs the
//! underlying model method itself, converting values on the way in and
//! out.

use std::collections::HashMap;

use hexya_core::RpcError;
use hexya_domain::Domain;
use hexya_orm::{Arg, CallResult, RecordData, RecordSet};
use serde_json::{json, Map, Value};

use crate::cache::FieldsCache;
use crate::relations::{
    add_names_to_relations, create_with_relations, process_onchange_values, process_write_values,
};

pub type MethodAdapter = fn(&FieldsCache, &RecordSet, Vec<Arg>) -> Result<CallResult, RpcError>;

/// Adapters keyed by ORM method name.
pub struct AdapterTable {
    adapters: HashMap<&'static str, MethodAdapter>,
}

impl Default for AdapterTable {
    fn default() -> Self {
        let mut adapters: HashMap<&'static str, MethodAdapter> = HashMap::new();
        adapters.insert("Create", create);
        adapters.insert("Write", write);
        adapters.insert("Onchange", onchange);
        adapters.insert("Read", read);
        adapters.insert("SearchRead", search_read);
        adapters.insert("FieldsGet", fields_get);
        adapters.insert("NameGet", name_get);
        adapters.insert("GetFilters", get_filters);
        Self { adapters }
    }
}

impl AdapterTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, method: &str) -> Option<MethodAdapter> {
        self.adapters.get(method).copied()
    }

    pub fn contains(&self, method: &str) -> bool {
        self.adapters.contains_key(method)
    }

    /// Add or replace the adapter of `method`.
    pub fn insert(&mut self, method: &'static str, adapter: MethodAdapter) {
        self.adapters.insert(method, adapter);
    }
}

fn expect_args(method: &str, args: &[Arg], count: usize) -> Result<(), RpcError> {
    if args.len() != count {
        return Err(RpcError::Arity(format!(
            "wrong number of args for {} ({} instead of {})",
            method,
            args.len(),
            count
        )));
    }
    Ok(())
}

fn data_arg(rs: &RecordSet, arg: &Arg) -> RecordData {
    match arg {
        Arg::Data(d) => RecordData::from_map(rs.model_name(), d.fields.clone()),
        _ => RecordData::new(rs.model_name()),
    }
}

fn unexpected(method: &str, result: CallResult) -> RpcError {
    RpcError::Internal(format!("{} returned an unexpected value: {:?}", method, result))
}

fn create(cache: &FieldsCache, rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, RpcError> {
    expect_args("create", &args, 1)?;
    let data = data_arg(rs, &args[0]);
    Ok(CallResult::Collection(create_with_relations(cache, rs, data)?))
}

fn write(cache: &FieldsCache, rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, RpcError> {
    expect_args("write", &args, 1)?;
    let data = process_write_values(cache, rs, data_arg(rs, &args[0]))?;
    Ok(rs.call("Write", vec![Arg::Data(data)])?)
}

fn onchange(
    cache: &FieldsCache,
    rs: &RecordSet,
    mut args: Vec<Arg>,
) -> Result<CallResult, RpcError> {
    expect_args("onchange", &args, 1)?;
    if let Arg::Struct(params) = &mut args[0] {
        let values = params.get_data("values").cloned().unwrap_or_default();
        let values = RecordData::from_map(rs.model_name(), values.fields);
        params.set("values", Arg::Data(process_onchange_values(cache, rs, values)?));
    }
    let result = match rs.call("Onchange", args)? {
        CallResult::Onchange(result) => result,
        other => return Err(unexpected("Onchange", other)),
    };
    let value = add_names_to_relations(rs, result.value, &cache.get(rs))?;
    let domain: Map<String, Value> = result
        .filters
        .iter()
        .map(|(field, cond)| (field.clone(), Value::Array(Domain::from_condition(cond).0)))
        .collect();
    Ok(CallResult::Json(json!({
        "value": value,
        "warning": result.warning,
        "domain": domain,
    })))
}

fn named_rows(
    cache: &FieldsCache,
    rs: &RecordSet,
    method: &str,
    result: CallResult,
) -> Result<Vec<RecordData>, RpcError> {
    let CallResult::DataList(rows) = result else {
        return Err(unexpected(method, result));
    };
    let infos = cache.get(rs);
    let mut named = Vec::with_capacity(rows.len());
    for row in rows {
        named.push(add_names_to_relations(rs, row, &infos)?);
    }
    Ok(named)
}

fn read(cache: &FieldsCache, rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, RpcError> {
    expect_args("read", &args, 1)?;
    let result = rs.call("Read", args)?;
    Ok(CallResult::DataList(named_rows(cache, rs, "Read", result)?))
}

fn search_read(
    cache: &FieldsCache,
    rs: &RecordSet,
    args: Vec<Arg>,
) -> Result<CallResult, RpcError> {
    expect_args("search_read", &args, 1)?;
    let result = rs.call("SearchRead", args)?;
    Ok(CallResult::DataList(named_rows(cache, rs, "SearchRead", result)?))
}

fn fields_get(
    _cache: &FieldsCache,
    rs: &RecordSet,
    args: Vec<Arg>,
) -> Result<CallResult, RpcError> {
    expect_args("fields_get", &args, 1)?;
    let mut infos = match rs.call("FieldsGet", args)? {
        CallResult::FieldInfos(infos) => infos,
        other => return Err(unexpected("FieldsGet", other)),
    };
    for info in infos.values_mut() {
        let domain = info.filter.as_ref().map(Domain::from_condition).unwrap_or_default();
        info.domain = Value::String(domain.to_string());
    }
    Ok(CallResult::FieldInfos(infos))
}

/// `name_get` always answers with a list of pairs, one per record.
fn name_get(_cache: &FieldsCache, rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, RpcError> {
    expect_args("name_get", &args, 0)?;
    let mut pairs = Vec::with_capacity(rs.len());
    for record in rs.records() {
        let name = match record.call("NameGet", Vec::new())? {
            CallResult::Str(name) => name,
            other => return Err(unexpected("NameGet", other)),
        };
        pairs.push(hexya_core::RecordRef::new(record.id(), name));
    }
    Ok(CallResult::NamePairs(pairs))
}

const FILTER_FIELDS: [&str; 6] = ["name", "is_default", "domain", "context", "user_id", "sort"];

fn get_filters(
    cache: &FieldsCache,
    rs: &RecordSet,
    args: Vec<Arg>,
) -> Result<CallResult, RpcError> {
    expect_args("get_filters", &args, 2)?;
    let result = rs.call("GetFilters", args)?;
    let rows = named_rows(cache, rs, "GetFilters", result)?;
    let filters = rows
        .into_iter()
        .map(|row| {
            let mut out = Map::new();
            for field in FILTER_FIELDS {
                let value = row.get(field).cloned().unwrap_or(Value::Bool(false));
                out.insert(field.to_string(), value);
            }
            Value::Object(out)
        })
        .collect();
    Ok(CallResult::Json(Value::Array(filters)))
}
