use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::StoreError;
use crate::overlay::{Mutation, WriteBatch};
use crate::traits::RecordStore;

/// MemoryStore keeps every record in a sorted in-process map.
///
/// Used by `--in-memory` deployments and by tests.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("memory store lock poisoned".into())
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data.get(key).cloned())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        for (key, mutation) in batch.iter() {
            match mutation {
                Mutation::Put(v) => {
                    data.insert(key.clone(), v.clone());
                }
                Mutation::Delete => {
                    data.remove(key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_get_scan() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        let mut batch = WriteBatch::default();
        batch.put("Partner:2", b"b".to_vec());
        batch.put("Partner:1", b"a".to_vec());
        batch.put("User:1", b"u".to_vec());
        store.commit(&batch).unwrap();

        assert_eq!(store.len(), 3);
        assert_eq!(store.get("User:1").unwrap().unwrap(), b"u");
        let keys: Vec<String> = store
            .scan("Partner:")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["Partner:1", "Partner:2"]);

        let mut batch = WriteBatch::default();
        batch.delete("Partner:1");
        store.commit(&batch).unwrap();
        assert!(store.get("Partner:1").unwrap().is_none());
    }
}
