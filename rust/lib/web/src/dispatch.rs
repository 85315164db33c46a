//! Dispatch of client calls to model methods.

use std::sync::Arc;

use hexya_core::{Principal, RpcError};
use hexya_domain::Domain;
use hexya_orm::{
    Arg, ArgStruct, CallResult, Context, Orm, OrmError, ParamKind, ParamSpec, RecordData, RecordSet,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::adapters::AdapterTable;
use crate::binder::Binder;
use crate::cache::FieldsCache;
use crate::names::{method_name, model_name};
use crate::relations::format_relation_fields;
use crate::resolver::resolve;

/// Parameters of `call_kw`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallRequest {
    pub model: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

/// Parameters of the `search_read` route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchReadParams {
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub domain: Domain,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub limit: Value,
    pub model: String,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub sort: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchReadResult {
    pub records: Vec<RecordData>,
    pub length: usize,
}

/// Turns client calls into ORM method calls.
pub struct Dispatcher {
    orm: Orm,
    binder: Binder,
    adapters: AdapterTable,
    cache: Arc<FieldsCache>,
}

impl Dispatcher {
    pub fn new(orm: Orm) -> Self {
        Self {
            orm,
            binder: Binder::default(),
            adapters: AdapterTable::new(),
            cache: Arc::new(FieldsCache::new()),
        }
    }

    /// Reject arguments that cannot be decoded instead of zeroing them.
    pub fn with_strict_args(mut self, strict: bool) -> Self {
        self.binder = Binder::new(strict);
        self
    }

    pub fn with_adapters(mut self, adapters: AdapterTable) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    pub fn cache(&self) -> &FieldsCache {
        &self.cache
    }

    /// Run `req` as `principal` in its own transaction and return the
    /// JSON result.
    pub fn execute(
        &self,
        principal: Option<Principal>,
        req: &CallRequest,
    ) -> Result<Value, RpcError> {
        let uid = check_user(principal)?;
        let model = model_name(&req.model);
        let method = method_name(&req.method);
        debug!(%model, %method, uid, "executing model method");
        let result = self.orm.execute_in_new_environment(uid, |env| -> Result<Value, RpcError> {
            let resolved = resolve(env, &model, &req.args)?;
            debug!(
                ids = ?resolved.collection.ids(),
                single = resolved.single,
                "resolved target records"
            );
            let context = extract_context(&req.kwargs)?;
            let rs = resolved.collection.with_new_context(context);
            let descriptor = rs.method_descriptor(&method)?.clone();
            let args = self.binder.bind(&model, &descriptor, resolved.remaining, &req.kwargs)?;
            let result = match self.adapters.get(&method) {
                Some(adapter) => adapter(&self.cache, &rs, args)?,
                None => rs.call(&method, args)?,
            };
            convert_returned_value(&self.cache, &rs, result)
        });
        if let Err(err) = &result {
            warn!(%model, %method, uid, error = %err, "model method failed");
        }
        result
    }

    /// Records of a model for a list view, with the total number of
    /// matching records.
    pub fn search_read(
        &self,
        principal: Option<Principal>,
        params: &SearchReadParams,
    ) -> Result<SearchReadResult, RpcError> {
        let uid = check_user(principal)?;
        let model = model_name(&params.model);
        debug!(%model, uid, "search_read");
        self.orm.execute_in_new_environment(uid, |env| -> Result<SearchReadResult, RpcError> {
            let context = Context::from_map(params.context.clone());
            let rs = env.pool(&model)?.with_new_context(context);
            let specs = [
                ParamSpec::new("domain", ParamKind::Domain),
                ParamSpec::new("fields", ParamKind::Strings),
                ParamSpec::new("offset", ParamKind::Int),
                ParamSpec::new("limit", ParamKind::Any),
                ParamSpec::new("order", ParamKind::Str),
            ];
            let mut search = ArgStruct::zeroed(&specs);
            search.set("domain", Arg::Domain(params.domain.clone()));
            search.set("fields", Arg::Strings(params.fields.clone()));
            search.set("offset", Arg::Int(i64::try_from(params.offset).unwrap_or(i64::MAX)));
            search.set("limit", Arg::Json(params.limit.clone()));
            search.set("order", Arg::Str(params.sort.clone()));
            let records = match self.adapters.get("SearchRead") {
                Some(adapter) => adapter(&self.cache, &rs, vec![Arg::Struct(search)])?,
                None => rs.call("SearchRead", vec![Arg::Struct(search)])?,
            };
            let CallResult::DataList(records) = records else {
                return Err(RpcError::Internal("SearchRead did not return records".into()));
            };
            let domain = params.domain.parse().map_err(OrmError::from)?;
            let length = rs.search_count(&domain)?;
            Ok(SearchReadResult { records, length })
        })
    }
}

fn check_user(principal: Option<Principal>) -> Result<i64, RpcError> {
    match principal {
        Some(p) if p.uid != 0 => Ok(p.uid),
        _ => Err(RpcError::AuthenticationRequired(
            "User must be logged in to call model method".into(),
        )),
    }
}

/// The `context` keyword argument, or an empty context.
fn extract_context(kwargs: &Map<String, Value>) -> Result<Context, RpcError> {
    match kwargs.get("context") {
        None | Some(Value::Null) => Ok(Context::new()),
        Some(Value::Object(map)) => Ok(Context::from_map(map.clone())),
        Some(other) => Err(RpcError::TypeMismatch(format!(
            "context must be an object, got {}",
            other
        ))),
    }
}

/// JSON form of a method result.
///
/// Record sets become `[]` when empty, their id when they hold one
/// record and a list of ids otherwise. Record data has its relation
/// values flattened to ids.
pub fn convert_returned_value(
    cache: &FieldsCache,
    rs: &RecordSet,
    result: CallResult,
) -> Result<Value, RpcError> {
    Ok(match result {
        CallResult::None => Value::Null,
        CallResult::Bool(b) => Value::Bool(b),
        CallResult::Int(i) => Value::from(i),
        CallResult::Str(s) => Value::String(s),
        CallResult::Json(v) => v,
        CallResult::Collection(records) => match records.ids() {
            [] => Value::Array(Vec::new()),
            [id] => Value::from(*id),
            ids => Value::from(ids.to_vec()),
        },
        CallResult::Data(data) => json(&format_relation_fields(data, &cache.get(rs)))?,
        CallResult::DataList(rows) => json(&rows)?,
        CallResult::Onchange(result) => {
            let value = format_relation_fields(result.value, &cache.get(rs));
            let domain: Map<String, Value> = result
                .filters
                .iter()
                .map(|(field, cond)| (field.clone(), Value::Array(Domain::from_condition(cond).0)))
                .collect();
            serde_json::json!({"value": json(&value)?, "warning": result.warning, "domain": domain})
        }
        CallResult::FieldInfos(infos) => json(&infos)?,
        CallResult::NamePairs(pairs) => json(&pairs)?,
    })
}

fn json<T: Serialize>(v: &T) -> Result<Value, RpcError> {
    serde_json::to_value(v).map_err(|e| RpcError::Internal(e.to_string()))
}
