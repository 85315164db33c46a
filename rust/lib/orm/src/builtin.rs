//! Methods every model has.

use crate::data::{OnchangeParams, RecordData};
use crate::error::OrmError;
use crate::method::{arg_or_zero, Arg, ArgStruct, CallResult, MethodDescriptor, ParamKind};
use crate::recordset::RecordSet;
use crate::registry::Registry;

pub(crate) fn register(reg: &mut Registry) {
    let data = MethodDescriptor::positional(&[("data", ParamKind::RecordData)]);
    let fields = MethodDescriptor::positional(&[("fields", ParamKind::Strings)]);
    reg.add_common_method("Create", data.clone(), create);
    reg.add_common_method("Write", data, write);
    reg.add_common_method("Read", fields.clone(), read);
    reg.add_common_method("Unlink", MethodDescriptor::none(), unlink);
    // Variadic so that `search([])`, whose empty list is taken as the
    // record ids, still reaches the method.
    reg.add_common_method(
        "Search",
        MethodDescriptor::variadic(&[("domain", ParamKind::Domain)]),
        search,
    );
    reg.add_common_method("SearchAll", MethodDescriptor::none(), search_all);
    reg.add_common_method(
        "Browse",
        MethodDescriptor::positional(&[("ids", ParamKind::Ids)]),
        browse,
    );
    reg.add_common_method("NameGet", MethodDescriptor::none(), name_get);
    reg.add_common_method(
        "FieldsGet",
        MethodDescriptor::structure(&[
            ("fields", ParamKind::Strings),
            ("attributes", ParamKind::Strings),
        ]),
        fields_get,
    );
    reg.add_common_method("DefaultGet", fields, default_get);
    reg.add_common_method(
        "Onchange",
        MethodDescriptor::structure(&[
            ("values", ParamKind::RecordData),
            ("field_name", ParamKind::Strings),
            ("field_onchange", ParamKind::Any),
        ]),
        onchange,
    );
    reg.add_common_method("CheckConstraints", MethodDescriptor::none(), check_constraints);
}

/// The record data argument at `index`, bound to the model of `rs`.
pub fn data_arg(rs: &RecordSet, args: &[Arg], index: usize) -> RecordData {
    match args.get(index) {
        Some(Arg::Data(d)) => RecordData::from_map(rs.model_name(), d.fields.clone()),
        _ => RecordData::new(rs.model_name()),
    }
}

fn struct_arg(args: &[Arg]) -> ArgStruct {
    match args.first() {
        Some(Arg::Struct(s)) => s.clone(),
        _ => ArgStruct::default(),
    }
}

fn create(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::Collection(rs.create(&data_arg(rs, &args, 0))?))
}

fn write(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::Bool(rs.write(&data_arg(rs, &args, 0))?))
}

fn read(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let fields = arg_or_zero(&args, 0, ParamKind::Strings);
    Ok(CallResult::DataList(rs.read(fields.as_strings())?))
}

fn unlink(rs: &RecordSet, _args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::Bool(rs.unlink()?))
}

fn search(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let cond = match args.first() {
        Some(Arg::Domain(d)) => d.parse()?,
        _ => hexya_domain::Condition::All,
    };
    Ok(CallResult::Collection(rs.search(&cond)?))
}

fn search_all(rs: &RecordSet, _args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::Collection(rs.search_all()?))
}

fn browse(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let ids = arg_or_zero(&args, 0, ParamKind::Ids);
    Ok(CallResult::Collection(rs.browse(ids.as_ids())))
}

fn name_get(rs: &RecordSet, _args: Vec<Arg>) -> Result<CallResult, OrmError> {
    Ok(CallResult::Str(rs.name_get()?))
}

fn fields_get(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let params = struct_arg(&args);
    Ok(CallResult::FieldInfos(rs.fields_get(params.get_strings("fields"))))
}

fn default_get(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let fields = arg_or_zero(&args, 0, ParamKind::Strings);
    Ok(CallResult::Data(rs.default_get(fields.as_strings())?))
}

fn onchange(rs: &RecordSet, args: Vec<Arg>) -> Result<CallResult, OrmError> {
    let params = struct_arg(&args);
    let values = match params.get_data("values") {
        Some(d) => RecordData::from_map(rs.model_name(), d.fields.clone()),
        None => RecordData::new(rs.model_name()),
    };
    let params = OnchangeParams {
        values,
        field_name: params.get_strings("field_name").to_vec(),
        field_onchange: params.get_json("field_onchange"),
    };
    Ok(CallResult::Onchange(rs.onchange(&params)?))
}

fn check_constraints(rs: &RecordSet, _args: Vec<Arg>) -> Result<CallResult, OrmError> {
    rs.check_constraints()?;
    Ok(CallResult::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Orm;
    use crate::fields::FieldDef;
    use crate::model::ModelDef;
    use hexya_domain::Domain;
    use hexya_store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn orm() -> Orm {
        let mut reg = Registry::new();
        reg.add_model(ModelDef::new("Tag").with_field(FieldDef::char("Name")));
        Orm::new(reg, Arc::new(MemoryStore::new()))
    }

    fn tag(name: &str) -> Arg {
        let mut d = RecordData::new("");
        d.set("name", json!(name));
        Arg::Data(d)
    }

    #[test]
    fn crud_through_call() {
        let orm = orm();
        let names = orm
            .execute_in_new_environment(1, |env| -> Result<_, OrmError> {
                let pool = env.pool("Tag")?;
                for name in ["red", "green", "blue"] {
                    pool.call("Create", vec![tag(name)])?;
                }
                let not_green = Domain::new(vec![json!(["name", "!=", "green"])]);
                let found = pool
                    .call("Search", vec![Arg::Domain(not_green)])?
                    .into_collection()
                    .unwrap_or(pool.clone());
                found.call("Write", vec![tag("dark")])?;
                let all = pool.call("SearchAll", vec![])?.into_collection().unwrap_or(pool.clone());
                match all.call("Read", vec![Arg::Strings(vec!["name".into()])])? {
                    CallResult::DataList(rows) => Ok(rows
                        .iter()
                        .map(|r| r.get("name").cloned().unwrap_or_default())
                        .collect::<Vec<_>>()),
                    other => panic!("unexpected result {:?}", other),
                }
            })
            .unwrap();
        assert_eq!(names, vec![json!("dark"), json!("green"), json!("dark")]);
    }

    #[test]
    fn unknown_method() {
        let orm = orm();
        let err = orm
            .execute_in_new_environment(1, |env| env.pool("Tag")?.call("Nope", vec![]))
            .unwrap_err();
        assert!(matches!(err, OrmError::UnknownMethod { .. }));
    }
}
