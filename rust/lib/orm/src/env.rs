use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use hexya_store::{RecordStore, StoreError, TxOverlay};
use serde_json::Value;

use crate::context::Context;
use crate::data::FieldMap;
use crate::error::OrmError;
use crate::model::ModelDef;
use crate::recordset::RecordSet;
use crate::registry::Registry;

/// User id of the administrator, who bypasses access checks.
pub const SUPERUSER_ID: i64 = 1;

/// Entry point of the ORM: the model registry bound to a record store.
///
/// Cheap to clone; clones share the store and id sequences.
#[derive(Clone)]
pub struct Orm {
    registry: Arc<Registry>,
    store: Arc<dyn RecordStore>,
    sequences: Arc<Mutex<HashMap<String, i64>>>,
    /// Held for the whole life of an environment. Transactions run one
    /// at a time and must not nest.
    tx_lock: Arc<Mutex<()>>,
}

impl Orm {
    pub fn new(registry: Registry, store: Arc<dyn RecordStore>) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            sequences: Arc::new(Mutex::new(HashMap::new())),
            tx_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run `f` in a fresh environment for `uid`.
    ///
    /// Writes made by `f` are committed when it returns `Ok` and dropped
    /// when it returns `Err`.
    pub fn execute_in_new_environment<T, E, F>(&self, uid: i64, f: F) -> Result<T, E>
    where
        E: From<OrmError>,
        F: FnOnce(&Environment) -> Result<T, E>,
    {
        // A panic inside a previous call leaves nothing pending behind.
        let _guard = self.tx_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let env = Environment {
            shared: Arc::new(EnvShared {
                orm: self.clone(),
                tx: TxOverlay::new(self.store.clone()),
                uid,
            }),
            context: Context::default(),
        };
        match f(&env) {
            Ok(res) => {
                env.shared.tx.commit().map_err(OrmError::from)?;
                Ok(res)
            }
            Err(e) => {
                let dropped = env.shared.tx.pending_len();
                env.shared.tx.rollback().map_err(OrmError::from)?;
                tracing::debug!(uid, dropped, "transaction rolled back");
                Err(e)
            }
        }
    }
}

struct EnvShared {
    orm: Orm,
    tx: TxOverlay,
    uid: i64,
}

/// The user, context and pending transaction a call runs in.
#[derive(Clone)]
pub struct Environment {
    shared: Arc<EnvShared>,
    context: Context,
}

impl Environment {
    pub fn uid(&self) -> i64 {
        self.shared.uid
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn with_context(&self, context: Context) -> Environment {
        Environment {
            shared: self.shared.clone(),
            context,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.shared.orm.registry
    }

    pub fn model(&self, name: &str) -> Result<Arc<ModelDef>, OrmError> {
        self.registry().model(name)
    }

    /// Empty record set of `model`.
    pub fn pool(&self, model: &str) -> Result<RecordSet, OrmError> {
        Ok(RecordSet::new(self.clone(), self.model(model)?, Vec::new()))
    }

    /// Record set of `model` with the given ids, unchecked.
    pub fn browse(&self, model: &str, ids: &[i64]) -> Result<RecordSet, OrmError> {
        Ok(RecordSet::new(self.clone(), self.model(model)?, ids.to_vec()))
    }

    pub(crate) fn load(&self, model: &str, id: i64) -> Result<Option<FieldMap>, OrmError> {
        match self.shared.tx.get(&record_key(model, id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All records of `model`, by ascending id.
    pub(crate) fn load_all(&self, model: &str) -> Result<Vec<FieldMap>, OrmError> {
        self.shared
            .tx
            .scan(&model_prefix(model))?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes))
            .collect()
    }

    pub(crate) fn save(&self, model: &str, id: i64, values: &FieldMap) -> Result<(), OrmError> {
        let bytes =
            serde_json::to_vec(values).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.shared.tx.put(&record_key(model, id), bytes)?;
        Ok(())
    }

    pub(crate) fn remove(&self, model: &str, id: i64) -> Result<(), OrmError> {
        self.shared.tx.delete(&record_key(model, id))?;
        Ok(())
    }

    /// Next free id of `model`. Ids are never reused, even when the
    /// transaction that took one rolls back.
    pub(crate) fn next_id(&self, model: &str) -> Result<i64, OrmError> {
        let current = self.current_sequence(model)?;
        let mut seqs = self.lock_sequences()?;
        let seq = seqs.entry(model.to_string()).or_insert(current);
        *seq += 1;
        Ok(*seq)
    }

    /// Make sure the sequence of `model` never hands out `id`.
    pub(crate) fn reserve_id(&self, model: &str, id: i64) -> Result<(), OrmError> {
        let current = self.current_sequence(model)?;
        let mut seqs = self.lock_sequences()?;
        let seq = seqs.entry(model.to_string()).or_insert(current);
        if *seq < id {
            *seq = id;
        }
        Ok(())
    }

    fn current_sequence(&self, model: &str) -> Result<i64, OrmError> {
        if let Some(seq) = self.lock_sequences()?.get(model) {
            return Ok(*seq);
        }
        let max = self
            .load_all(model)?
            .iter()
            .filter_map(|r| r.get("id").and_then(Value::as_i64))
            .max()
            .unwrap_or_default();
        Ok(max)
    }

    fn lock_sequences(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, i64>>, OrmError> {
        self.shared
            .orm
            .sequences
            .lock()
            .map_err(|_| OrmError::Storage(StoreError::Storage("sequence lock poisoned".into())))
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("uid", &self.shared.uid)
            .field("context", &self.context)
            .finish()
    }
}

fn model_prefix(model: &str) -> String {
    format!("{}:", model)
}

fn record_key(model: &str, id: i64) -> String {
    format!("{}:{:020}", model, id)
}

fn decode(bytes: &[u8]) -> Result<FieldMap, OrmError> {
    serde_json::from_slice(bytes)
        .map_err(|e| OrmError::Storage(StoreError::Serialization(e.to_string())))
}
