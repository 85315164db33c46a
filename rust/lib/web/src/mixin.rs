//! Client-facing methods added to every model by the web addon.

use hexya_core::cast_to_integer;
use hexya_domain::{Condition, Domain, Operator};
use hexya_orm::{
    magic, Arg, ArgStruct, CallResult, FieldMap, MethodDescriptor, OrmError, ParamKind, RecordData,
    RecordSet, Registry, SearchQuery,
};
use indexmap::IndexMap;
use serde_json::{json, Value};

const SEARCH_PARAMS: [(&str, ParamKind); 5] = [
    ("domain", ParamKind::Domain),
    ("fields", ParamKind::Strings),
    ("offset", ParamKind::Int),
    ("limit", ParamKind::Any),
    ("order", ParamKind::Str),
];

const READ_GROUP_PARAMS: [(&str, ParamKind); 7] = [
    ("domain", ParamKind::Domain),
    ("fields", ParamKind::Strings),
    ("groupby", ParamKind::Strings),
    ("offset", ParamKind::Int),
    ("limit", ParamKind::Any),
    ("orderby", ParamKind::Str),
    ("lazy", ParamKind::Bool),
];

const WEB_READ_GROUP_PARAMS: [(&str, ParamKind); 10] = [
    ("domain", ParamKind::Domain),
    ("fields", ParamKind::Strings),
    ("groupby", ParamKind::Strings),
    ("offset", ParamKind::Int),
    ("limit", ParamKind::Any),
    ("orderby", ParamKind::Str),
    ("lazy", ParamKind::Bool),
    ("expand", ParamKind::Bool),
    ("expand_limit", ParamKind::Any),
    ("expand_orderby", ParamKind::Str),
];

pub fn register(reg: &mut Registry) {
    reg.add_common_method(
        "NameSearch",
        MethodDescriptor::structure(&[
            ("args", ParamKind::Domain),
            ("name", ParamKind::Str),
            ("operator", ParamKind::Str),
            ("limit", ParamKind::Any),
        ]),
        name_search,
    );
    reg.add_common_method("SearchRead", MethodDescriptor::structure(&SEARCH_PARAMS), search_read);
    reg.add_common_method(
        "WebSearchRead",
        MethodDescriptor::structure(&SEARCH_PARAMS),
        web_search_read,
    );
    let domain_only = MethodDescriptor::variadic(&[("domain", ParamKind::Domain)]);
    reg.add_common_method("SearchDomain", domain_only.clone(), search_domain);
    reg.add_common_method("SearchCount", domain_only, search_count);
    reg.add_common_method("ReadGroup", MethodDescriptor::structure(&READ_GROUP_PARAMS), read_group);
    reg.add_common_method(
        "WebReadGroup",
        MethodDescriptor::structure(&WEB_READ_GROUP_PARAMS),
        web_read_group,
    );
    reg.add_common_method(
        "CheckAccessRights",
        MethodDescriptor::structure(&[
            ("operation", ParamKind::Str),
            ("raise_exception", ParamKind::Bool),
        ]),
        check_access_rights,
    );
}

/// Records of the model of `rs` matching `domain`, paged and sorted.
pub fn add_domain_limit_offset(
    rs: &RecordSet,
    domain: &Domain,
    limit: Option<usize>,
    offset: usize,
    order: &str,
) -> Result<RecordSet, OrmError> {
    let mut query = SearchQuery::new(domain.parse()?).limit(limit).offset(offset);
    if !order.trim().is_empty() {
        query = query.order(order);
    }
    rs.search_query(&query)
}

/// A positive limit sent by the client; anything else means no limit.
pub fn limit_from_json(v: &Value) -> Option<usize> {
    cast_to_integer(v)
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
}

fn struct_arg(args: &[Arg]) -> ArgStruct {
    match args.first() {
        Some(Arg::Struct(s)) => s.clone(),
        _ => ArgStruct::default(),
    }
}

fn domain_arg(args: &[Arg]) -> Domain {
    match args.first() {
        Some(Arg::Domain(d)) => d.clone(),
        _ => Domain::default(),
    }
}

fn offset_of(params: &ArgStruct) -> usize {
    usize::try_from(params.get_i64("offset")).unwrap_or_default()
}

fn name_search(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let params = struct_arg(&args);
    let mut cond = params.get_domain("args").parse()?;
    let name = params.get_str("name");
    if !name.is_empty() {
        let operator = match params.get_str("operator") {
            "" => Operator::IContains,
            op => op.parse()?,
        };
        cond = cond.and(Condition::leaf(magic::DISPLAY_NAME, operator, json!(name)));
    }
    let query = SearchQuery::new(cond).limit(limit_from_json(&params.get_json("limit")));
    let found = rs.search_query(&query)?;
    Ok(CallResult::NamePairs(found.display_names()?))
}

fn search_rows(rs: &RecordSet, params: &ArgStruct) -> Result<Vec<RecordData>, OrmError> {
    let records = add_domain_limit_offset(
        rs,
        &params.get_domain("domain"),
        limit_from_json(&params.get_json("limit")),
        offset_of(params),
        params.get_str("order"),
    )?;
    records.read(params.get_strings("fields"))
}

fn search_read(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::DataList(search_rows(rs, &struct_arg(&args))?))
}

/// One page of records plus the number of matching records. The count is
/// only computed when the page is full.
fn web_search_read(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let params = struct_arg(&args);
    let rows = search_rows(rs, &params)?;
    if rows.is_empty() {
        return Ok(CallResult::Json(json!({"records": [], "length": 0})));
    }
    let limit = limit_from_json(&params.get_json("limit"));
    let length = if limit == Some(rows.len()) {
        rs.search_count(&params.get_domain("domain").parse()?)?
    } else {
        rows.len() + offset_of(&params)
    };
    let infos = rs.fields_get(&[]);
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(crate::relations::add_names_to_relations(rs, row, &infos)?);
    }
    Ok(CallResult::Json(json!({"records": records, "length": length})))
}

fn search_domain(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::Collection(rs.search(&domain_arg(&args).parse()?)?))
}

fn search_count(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let count = rs.search_count(&domain_arg(&args).parse()?)?;
    Ok(CallResult::Int(i64::try_from(count).unwrap_or(i64::MAX)))
}

struct Group {
    value: Value,
    count: usize,
    sums: IndexMap<String, f64>,
}

/// Group matching records by the first `groupby` field. Numeric fields
/// listed in `fields` are summed per group.
fn read_group(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let params = struct_arg(&args);
    let groupby = params.get_strings("groupby");
    let Some(first) = groupby.first() else {
        return Err(OrmError::InvalidValue("read_group needs at least one groupby field".into()));
    };
    let field = first.split(':').next().unwrap_or_default().to_string();
    rs.model().field_or_err(&field)?;
    let count_field = if params.get_bool("lazy") {
        format!("{}_count", field)
    } else {
        "__count".to_string()
    };
    let summed: Vec<String> = params
        .get_strings("fields")
        .iter()
        .map(|f| f.split(':').next().unwrap_or_default().to_string())
        .filter(|f| *f != field && rs.model().field(f).is_some_and(|d| d.field_type.is_numeric()))
        .collect();

    let domain = params.get_domain("domain");
    let order = match params.get_str("orderby") {
        "" => field.clone(),
        order => order.to_string(),
    };
    let records = add_domain_limit_offset(rs, &domain, None, 0, &order)?;
    let mut read_fields = summed.clone();
    read_fields.push(field.clone());

    let mut groups: IndexMap<String, Group> = IndexMap::new();
    for row in records.read(&read_fields)? {
        let value = row.get(&field).cloned().unwrap_or(Value::Bool(false));
        let group = groups.entry(value.to_string()).or_insert_with(|| Group {
            value: value.clone(),
            count: 0,
            sums: IndexMap::new(),
        });
        group.count += 1;
        for f in &summed {
            let n = row.get(f).and_then(Value::as_f64).unwrap_or_default();
            *group.sums.entry(f.clone()).or_default() += n;
        }
    }

    let infos = rs.fields_get(&[]);
    let limit = limit_from_json(&params.get_json("limit")).unwrap_or(usize::MAX);
    let mut out = Vec::new();
    for group in groups.into_values().skip(offset_of(&params)).take(limit) {
        let mut values = FieldMap::new();
        values.insert(field.clone(), group.value.clone());
        for (f, sum) in group.sums {
            let integer = rs
                .model()
                .field(&f)
                .is_some_and(|d| d.field_type == hexya_orm::FieldType::Integer);
            values.insert(f, if integer { json!(sum as i64) } else { json!(sum) });
        }
        values.insert(count_field.clone(), json!(group.count));
        let mut group_domain = vec![json!([field, "=", group.value])];
        group_domain.extend(domain.terms().iter().cloned());
        values.insert("__domain".to_string(), Value::Array(group_domain));
        if groupby.len() > 1 {
            values.insert("__context".to_string(), json!({"group_by": groupby[1..].to_vec()}));
        }
        let data = RecordData::from_map(rs.model_name(), values);
        let named = crate::relations::add_names_to_relations(rs, data, &infos)?;
        out.push(serde_json::to_value(named).map_err(|e| OrmError::InvalidValue(e.to_string()))?);
    }
    Ok(CallResult::Json(Value::Array(out)))
}

/// Groups of `read_group`, each optionally expanded with its first page
/// of records, and the number of groups matching the domain.
fn web_read_group(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let params = struct_arg(&args);
    let grouped = read_group(rs, vec![Arg::Struct(params.clone())])?;
    let CallResult::Json(Value::Array(mut groups)) = grouped else {
        return Err(OrmError::InvalidValue("read_group did not return groups".into()));
    };
    if params.get_bool("expand") && params.get_strings("groupby").len() == 1 {
        for group in &mut groups {
            let terms = group["__domain"].as_array().cloned().unwrap_or_default();
            let mut search = ArgStruct::default();
            search.set("domain", Arg::Domain(Domain::new(terms)));
            search.set("fields", Arg::Strings(params.get_strings("fields").to_vec()));
            search.set("limit", Arg::Json(params.get_json("expand_limit")));
            search.set("order", Arg::Str(params.get_str("expand_orderby").to_string()));
            if let CallResult::Json(page) = web_search_read(rs, vec![Arg::Struct(search)])? {
                group["__data"] = page;
            }
        }
    }
    let limit = limit_from_json(&params.get_json("limit"));
    let length = if groups.is_empty() {
        0
    } else if limit == Some(groups.len()) {
        let mut all = params.clone();
        all.set("offset", Arg::Int(0));
        all.set("limit", Arg::Null);
        match read_group(rs, vec![Arg::Struct(all)])? {
            CallResult::Json(Value::Array(all)) => all.len(),
            _ => groups.len(),
        }
    } else {
        groups.len() + offset_of(&params)
    };
    Ok(CallResult::Json(json!({"groups": groups, "length": length})))
}

fn check_access_rights(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let params = struct_arg(&args);
    let known = matches!(params.get_str("operation"), "read" | "write" | "create" | "unlink");
    Ok(CallResult::Bool(known && rs.env().uid() != 0))
}
