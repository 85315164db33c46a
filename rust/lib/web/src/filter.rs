//! Saved search filters of the web client.

use hexya_core::cast_to_integer;
use hexya_domain::{Condition, Operator};
use hexya_orm::{
    builtin::data_arg, Arg, CallResult, Environment, FieldDef, MethodDescriptor, ModelDef, OrmError,
    ParamKind, RecordData, RecordSet, Registry,
};
use serde_json::Value;
use tracing::debug;

pub const FILTER: &str = "Filter";

pub fn filter_model() -> ModelDef {
    ModelDef::new(FILTER)
        .description("Filters")
        .with_field(FieldDef::char("Name").string("Filter Name").required())
        .with_field(
            FieldDef::many2one("User", "User")
                .help(
                    "The user this filter is private to. When left empty the filter is public \
                     and available to all users.",
                )
                .default_fn(current_user),
        )
        .with_field(FieldDef::text("Domain").required().default_value("[]"))
        .with_field(FieldDef::text("Context").required().default_value("{}"))
        .with_field(FieldDef::text("Sort").required().default_value("[]"))
        .with_field(FieldDef::char("ResModel").json("model_id").string("Model").required())
        .with_field(FieldDef::boolean("IsDefault").string("Default Filter"))
        .with_field(
            FieldDef::char("Action")
                .json("action_id")
                .help(
                    "The menu action this filter applies to. When left empty, it applies to \
                     any menu for this model.",
                ),
        )
        .with_field(FieldDef::boolean("Active").required().default_value(true))
        .with_constraint(
            "name_model_uid_unique",
            &["name", "model_id", "user_id", "action_id"],
            check_unique,
        )
        .with_method(
            "GetFilters",
            MethodDescriptor::positional(&[
                ("model", ParamKind::Str),
                ("action_id", ParamKind::Str),
            ]),
            get_filters_method,
        )
        .with_method(
            "CreateOrReplace",
            MethodDescriptor::positional(&[("vals", ParamKind::RecordData)]),
            create_or_replace_method,
        )
}

/// Add the web client's fields to the base models.
pub(crate) fn extend_base_models(reg: &mut Registry) -> Result<(), OrmError> {
    if reg.has_model("User") {
        reg.extend_model("User", |m| {
            m.with_field(
                FieldDef::selection("ChatterPosition", &[("normal", "Normal"), ("sided", "Sided")])
                    .string("Chatter Position")
                    .default_value("sided"),
            )
            .with_field(
                FieldDef::boolean("SidebarVisible")
                    .string("Show App Sidebar")
                    .default_value(true),
            )
        })?;
    }
    if reg.has_model("Company") {
        reg.extend_model("Company", |m| {
            m.with_field(
                FieldDef::binary("DashboardBackground").string("Apps Dashboard Background"),
            )
        })?;
    }
    Ok(())
}

fn current_user(env: &Environment) -> Result<Value, OrmError> {
    Ok(Value::from(env.uid()))
}

/// Filters with the same name, model, user and action must not exist
/// twice. A record without user or action never conflicts.
fn check_unique(rs: &RecordSet) -> Result<(), OrmError> {
    for record in rs.records() {
        let row = record.read(&[])?.pop().unwrap_or_default();
        let value = |f: &str| row.get(f).cloned().unwrap_or(Value::Null);
        let unset = |v: &Value| matches!(v, Value::Null | Value::Bool(false));
        if unset(&value("user_id")) || unset(&value("action_id")) {
            continue;
        }
        let cond = ["name", "model_id", "user_id", "action_id"]
            .into_iter()
            .fold(Condition::All, |c, f| c.and(Condition::leaf(f, Operator::Equals, value(f))))
            .and(Condition::leaf("id", Operator::NotEquals, Value::from(record.id())));
        if rs.search_count(&cond)? > 0 {
            return Err(OrmError::ConstraintViolation(
                "Filter names must be unique".to_string(),
            ));
        }
    }
    Ok(())
}

fn action_condition(action_id: &str) -> Condition {
    let unset = Condition::leaf("action_id", Operator::Equals, Value::Bool(false));
    if action_id.is_empty() {
        return unset;
    }
    Condition::leaf("action_id", Operator::Equals, Value::from(action_id)).or(unset)
}

/// Filters of `model` visible to the current user: their own and the
/// shared ones, for `action_id` or for any action.
pub fn get_filters(rs: &RecordSet, model: &str, action_id: &str) -> Result<RecordSet, OrmError> {
    let uid = rs.env().uid();
    let user = Condition::leaf("user_id", Operator::Equals, Value::from(uid))
        .or(Condition::leaf("user_id", Operator::Equals, Value::Bool(false)));
    let cond = Condition::leaf("model_id", Operator::Equals, Value::from(model))
        .and(action_condition(action_id))
        .and(user);
    rs.env().pool(FILTER)?.search(&cond)
}

fn get_filters_method(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let model = args.first().map(Arg::as_str).unwrap_or_default();
    let action_id = args.get(1).map(Arg::as_str).unwrap_or_default();
    Ok(CallResult::DataList(get_filters(rs, model, action_id)?.read(&[])?))
}

const KEYWORDS: [(&str, &str); 3] = [("true", "True"), ("false", "False"), ("null", "None")];

/// Render a domain or context value as the literal the client evaluates:
/// JSON with Python booleans and `None`.
pub fn python_literal(v: &Value) -> String {
    let json = match v {
        Value::String(s) => return s.clone(),
        other => other.to_string(),
    };
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = json.as_str();
    while let Some(c) = rest.chars().next() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
        } else if let Some((token, literal)) = KEYWORDS.iter().find(|(t, _)| rest.starts_with(t)) {
            out.push_str(literal);
            rest = &rest[token.len()..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn text_of(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Save a filter, replacing the user's filter of the same name if any.
pub fn create_or_replace(rs: &RecordSet, mut vals: RecordData) -> Result<RecordSet, OrmError> {
    for key in ["domain", "context", "sort"] {
        if let Some(v) = vals.get(key) {
            let literal = python_literal(v);
            vals.set(key, Value::String(literal));
        }
    }
    let user = match vals.get("user_id") {
        None => Some(rs.env().uid()),
        Some(v) => cast_to_integer(v).filter(|id| *id != 0),
    };
    vals.set("user_id", user.map(Value::from).unwrap_or(Value::Null));
    let action_id = text_of(vals.get("action_id"));
    vals.set(
        "action_id",
        if action_id.is_empty() { Value::Null } else { Value::from(action_id.clone()) },
    );
    let model = text_of(vals.get("model_id"));
    let name = text_of(vals.get("name")).to_lowercase();

    let current = get_filters(rs, &model, &action_id)?;
    let mut matching = Vec::new();
    for filter in current.records() {
        let same_user = cast_to_integer(&filter.get("user_id")?) == user;
        if same_user && text_of(Some(&filter.get("name")?)).to_lowercase() == name {
            matching.push(filter);
        }
    }

    let is_default = matches!(vals.get("is_default"), Some(Value::Bool(true)));
    if is_default {
        match user {
            Some(uid) => {
                let defaults = rs.env().pool(FILTER)?.search(
                    &Condition::leaf("model_id", Operator::Equals, Value::from(model.as_str()))
                        .and(action_condition(&action_id))
                        .and(Condition::leaf("user_id", Operator::Equals, Value::from(uid)))
                        .and(Condition::leaf("is_default", Operator::Equals, Value::Bool(true))),
                )?;
                if !defaults.is_empty() {
                    let mut off = RecordData::new(FILTER);
                    off.set("is_default", Value::Bool(false));
                    defaults.write(&off)?;
                }
            }
            None => check_global_default(rs, &model, &action_id, &matching)?,
        }
    }

    let pool = rs.env().pool(FILTER)?;
    let vals = RecordData::from_map(FILTER, vals.fields);
    if let Some(existing) = matching.first() {
        debug!(filter = existing.id(), "replacing filter");
        existing.write(&vals)?;
        return Ok(existing.clone());
    }
    pool.create(&vals)
}

/// Fails when another shared filter is already the default of `model`.
pub fn check_global_default(
    rs: &RecordSet,
    model: &str,
    action_id: &str,
    matching: &[RecordSet],
) -> Result<(), OrmError> {
    let defaults = rs.env().pool(FILTER)?.search(
        &Condition::leaf("model_id", Operator::Equals, Value::from(model))
            .and(action_condition(action_id))
            .and(Condition::leaf("user_id", Operator::Equals, Value::Bool(false)))
            .and(Condition::leaf("is_default", Operator::Equals, Value::Bool(true))),
    )?;
    if defaults.is_empty() {
        return Ok(());
    }
    if matching.first().is_some_and(|m| defaults.ids() == [m.id()]) {
        return Ok(());
    }
    Err(OrmError::ConstraintViolation(format!(
        "There is already a shared filter set as default for {}, \
         delete or change it before setting a new default",
        model
    )))
}

fn create_or_replace_method(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::Collection(create_or_replace(rs, data_arg(rs, &args, 0))?))
}
