#![allow(dead_code)]

use std::sync::Arc;

use hexya_core::{Principal, RpcError};
use hexya_orm::{load_seed_dir, Orm, Registry};
use hexya_store::MemoryStore;
use hexya_web::{CallRequest, Dispatcher};
use serde_json::{json, Value};

/// A dispatcher over an in-memory store holding the base seed data.
pub fn dispatcher() -> Dispatcher {
    let mut reg = Registry::new();
    hexya_base::register(&mut reg);
    hexya_web::register(&mut reg).unwrap();
    let orm = Orm::new(reg, Arc::new(MemoryStore::new()));
    load_seed_dir(&orm, &hexya_base::seed_dir()).unwrap();
    Dispatcher::new(orm)
}

pub fn request(model: &str, method: &str, args: Value, kwargs: Value) -> CallRequest {
    serde_json::from_value(json!({
        "model": model,
        "method": method,
        "args": args,
        "kwargs": kwargs,
    }))
    .unwrap()
}

/// Run a call as the administrator.
pub fn call(
    d: &Dispatcher,
    model: &str,
    method: &str,
    args: Value,
    kwargs: Value,
) -> Result<Value, RpcError> {
    d.execute(Some(Principal::new(1)), &request(model, method, args, kwargs))
}

pub fn call_ok(d: &Dispatcher, model: &str, method: &str, args: Value, kwargs: Value) -> Value {
    match call(d, model, method, args, kwargs) {
        Ok(v) => v,
        Err(err) => panic!("{}.{} failed: {:?}", model, method, err),
    }
}
