use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::traits::RecordStore;

/// A pending change to one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Put(Vec<u8>),
    Delete,
}

/// An ordered set of mutations applied by [`RecordStore::commit`].
///
/// A later mutation of the same key replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    entries: BTreeMap<String, Mutation>,
}

impl WriteBatch {
    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.insert(key.into(), Mutation::Put(value));
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.entries.insert(key.into(), Mutation::Delete);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Mutation)> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn poisoned() -> StoreError {
    StoreError::Storage("transaction overlay lock poisoned".into())
}

/// TxOverlay buffers the writes of one call on top of a base store.
///
/// - Reads see the call's own writes first, then the base store.
/// - `scan` merges both layers; pending deletes hide base entries.
/// - Nothing reaches the base store until [`TxOverlay::commit`]. Dropping
///   the overlay discards every pending write.
pub struct TxOverlay {
    base: Arc<dyn RecordStore>,
    pending: RwLock<BTreeMap<String, Mutation>>,
}

impl TxOverlay {
    pub fn new(base: Arc<dyn RecordStore>) -> Self {
        Self {
            base,
            pending: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        {
            let pending = self.pending.read().map_err(|_| poisoned())?;
            match pending.get(key) {
                Some(Mutation::Put(v)) => return Ok(Some(v.clone())),
                Some(Mutation::Delete) => return Ok(None),
                None => {}
            }
        }
        self.base.get(key)
    }

    pub fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let mut merged: BTreeMap<String, Vec<u8>> = self.base.scan(prefix)?.into_iter().collect();

        let pending = self.pending.read().map_err(|_| poisoned())?;
        for (key, mutation) in pending.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            match mutation {
                Mutation::Put(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                Mutation::Delete => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    pub fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut pending = self.pending.write().map_err(|_| poisoned())?;
        pending.insert(key.to_string(), Mutation::Put(value));
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut pending = self.pending.write().map_err(|_| poisoned())?;
        pending.insert(key.to_string(), Mutation::Delete);
        Ok(())
    }

    /// Number of keys touched so far.
    pub fn pending_len(&self) -> usize {
        self.pending.read().map(|p| p.len()).unwrap_or(0)
    }

    /// Take the buffered mutations, leaving the overlay empty.
    pub fn take_batch(&self) -> Result<WriteBatch, StoreError> {
        let mut pending = self.pending.write().map_err(|_| poisoned())?;
        Ok(WriteBatch {
            entries: std::mem::take(&mut *pending),
        })
    }

    /// Flush every pending write to the base store in one batch.
    pub fn commit(&self) -> Result<(), StoreError> {
        let batch = self.take_batch()?;
        if batch.is_empty() {
            return Ok(());
        }
        tracing::debug!(keys = batch.len(), "committing transaction");
        self.base.commit(&batch)
    }

    /// Drop every pending write.
    pub fn rollback(&self) -> Result<(), StoreError> {
        let mut pending = self.pending.write().map_err(|_| poisoned())?;
        if !pending.is_empty() {
            tracing::debug!(keys = pending.len(), "rolling back transaction");
        }
        pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn base_with(entries: &[(&str, &[u8])]) -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let mut batch = WriteBatch::default();
        for (k, v) in entries {
            batch.put(*k, v.to_vec());
        }
        store.commit(&batch).unwrap();
        Arc::new(store)
    }

    #[test]
    fn reads_own_writes() {
        let base = base_with(&[("Partner:1", b"old")]);
        let tx = TxOverlay::new(base.clone());

        tx.put("Partner:1", b"new".to_vec()).unwrap();
        tx.put("Partner:2", b"two".to_vec()).unwrap();

        assert_eq!(tx.get("Partner:1").unwrap().unwrap(), b"new");
        assert_eq!(tx.get("Partner:2").unwrap().unwrap(), b"two");
        // Base untouched until commit.
        assert_eq!(base.get("Partner:1").unwrap().unwrap(), b"old");
        assert!(base.get("Partner:2").unwrap().is_none());
    }

    #[test]
    fn delete_hides_base_entry() {
        let base = base_with(&[("Partner:1", b"a"), ("Partner:2", b"b")]);
        let tx = TxOverlay::new(base);

        tx.delete("Partner:1").unwrap();
        assert!(tx.get("Partner:1").unwrap().is_none());

        let keys: Vec<String> = tx.scan("Partner:").unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Partner:2".to_string()]);
    }

    #[test]
    fn scan_merges_layers() {
        let base = base_with(&[("Partner:1", b"a"), ("Partner:3", b"c"), ("User:1", b"u")]);
        let tx = TxOverlay::new(base);
        tx.put("Partner:2", b"b".to_vec()).unwrap();
        tx.put("Partner:3", b"C".to_vec()).unwrap();
        tx.put("Company:1", b"x".to_vec()).unwrap();

        let rows = tx.scan("Partner:").unwrap();
        assert_eq!(
            rows,
            vec![
                ("Partner:1".to_string(), b"a".to_vec()),
                ("Partner:2".to_string(), b"b".to_vec()),
                ("Partner:3".to_string(), b"C".to_vec()),
            ]
        );
    }

    #[test]
    fn commit_flushes_and_empties() {
        let base = base_with(&[]);
        let tx = TxOverlay::new(base.clone());
        tx.put("Partner:1", b"a".to_vec()).unwrap();
        assert_eq!(tx.pending_len(), 1);

        tx.commit().unwrap();
        assert_eq!(tx.pending_len(), 0);
        assert_eq!(base.get("Partner:1").unwrap().unwrap(), b"a");
    }

    #[test]
    fn rollback_discards() {
        let base = base_with(&[]);
        let tx = TxOverlay::new(base.clone());
        tx.put("Partner:1", b"a".to_vec()).unwrap();
        tx.rollback().unwrap();
        tx.commit().unwrap();
        assert!(base.get("Partner:1").unwrap().is_none());
    }

    #[test]
    fn batch_last_write_wins() {
        let mut batch = WriteBatch::default();
        batch.put("k", b"1".to_vec());
        batch.delete("k");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.iter().next().unwrap().1, &Mutation::Delete);
    }
}
