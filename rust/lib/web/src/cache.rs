use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use hexya_orm::{FieldInfo, RecordSet};
use indexmap::IndexMap;

/// Field descriptions of a model, keyed by client field name.
pub type FieldInfos = IndexMap<String, FieldInfo>;

/// Memoised `fields_get` metadata, one entry per model.
///
/// Field metadata only changes when the registry does, so entries live
/// until [`FieldsCache::invalidate`] is called.
#[derive(Default)]
pub struct FieldsCache {
    entries: RwLock<HashMap<String, Arc<FieldInfos>>>,
}

impl FieldsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptions of every field of the model of `rs`.
    pub fn get(&self, rs: &RecordSet) -> Arc<FieldInfos> {
        if let Some(infos) = self.read_entries().get(rs.model_name()) {
            return infos.clone();
        }
        let infos = Arc::new(rs.fields_get(&[]));
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(rs.model_name().to_string(), infos.clone());
        tracing::trace!(model = %rs.model_name(), "fields cached");
        infos
    }

    pub fn invalidate(&self, model: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(model);
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<FieldInfos>>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }
}
