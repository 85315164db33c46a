use hexya_core::{cast_to_integer, RecordRef};
use hexya_domain::{Condition, Operator};
use hexya_orm::{id_in, magic, Environment, OrmError, RecordSet};
use serde_json::Value;

/// Records targeted by a call, and the arguments left for the method.
#[derive(Debug)]
pub struct Resolved<'a> {
    pub collection: RecordSet,
    pub remaining: &'a [Value],
    /// The ids came from a single id rather than a list.
    pub single: bool,
}

/// Build the record set a call runs on.
///
/// The first argument is taken, in this order, as a list of
/// `[id, name]` pairs, a list of ids, one `[id, name]` pair or one id.
/// The first shape that fits wins and the argument is consumed. When none
/// fits, the call runs on the empty record set of the model and all
/// arguments are kept. Ids of records that do not exist are dropped.
pub fn resolve<'a>(
    env: &Environment,
    model: &str,
    args: &'a [Value],
) -> Result<Resolved<'a>, OrmError> {
    let pool = env.pool(model)?;
    let Some(first) = args.first() else {
        return Ok(Resolved {
            collection: pool,
            remaining: args,
            single: false,
        });
    };
    let (collection, single) = if let Some(ids) = id_list(first) {
        (pool.search(&id_in(&ids))?, false)
    } else if let Some(id) = single_id(first) {
        let cond = Condition::leaf(magic::ID, Operator::Equals, Value::from(id));
        (pool.search(&cond)?, true)
    } else {
        return Ok(Resolved {
            collection: pool,
            remaining: args,
            single: false,
        });
    };
    Ok(Resolved {
        collection,
        remaining: &args[1..],
        single,
    })
}

/// A list of `[id, name]` pairs or of ids. `null` counts as an empty list.
fn id_list(v: &Value) -> Option<Vec<i64>> {
    if v.is_null() {
        return Some(Vec::new());
    }
    if let Ok(refs) = serde_json::from_value::<Vec<RecordRef>>(v.clone()) {
        return Some(refs.into_iter().map(|r| r.id).collect());
    }
    v.as_array()?.iter().map(cast_to_integer).collect()
}

fn single_id(v: &Value) -> Option<i64> {
    if let Ok(r) = serde_json::from_value::<RecordRef>(v.clone()) {
        return Some(r.id);
    }
    cast_to_integer(v)
}
