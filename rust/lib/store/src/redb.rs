use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::StoreError;
use crate::overlay::{Mutation, WriteBatch};
use crate::traits::RecordStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

fn storage_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(e.to_string())
}

/// RedbStore is a RecordStore backed by redb, a pure-Rust embedded
/// key-value database. Each commit is one redb write transaction.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(storage_err)?;

        // Ensure the table exists by doing a write transaction.
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl RecordStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(TABLE).map_err(storage_err)?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(TABLE).map_err(storage_err)?;

        let mut results = Vec::new();
        let iter = table.range(prefix..).map_err(storage_err)?;

        for entry in iter {
            let entry = entry.map_err(storage_err)?;
            let key = entry.0.value().to_string();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key, entry.1.value().to_vec()));
        }

        Ok(results)
    }

    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage_err)?;
            for (key, mutation) in batch.iter() {
                match mutation {
                    Mutation::Put(value) => {
                        table.insert(key.as_str(), value.as_slice()).map_err(storage_err)?;
                    }
                    Mutation::Delete => {
                        table.remove(key.as_str()).map_err(storage_err)?;
                    }
                }
            }
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("test.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn commit_then_get() {
        let (store, _dir) = open();
        let mut batch = WriteBatch::default();
        batch.put("Partner:1", b"{\"name\":\"Azure\"}".to_vec());
        store.commit(&batch).unwrap();

        assert_eq!(store.get("Partner:1").unwrap().unwrap(), b"{\"name\":\"Azure\"}");
        assert!(store.get("Partner:2").unwrap().is_none());
    }

    #[test]
    fn scan_is_prefix_bounded_and_sorted() {
        let (store, _dir) = open();
        let mut batch = WriteBatch::default();
        batch.put("Partner:2", b"b".to_vec());
        batch.put("Partner:1", b"a".to_vec());
        batch.put("PartnerCategory:1", b"x".to_vec());
        batch.put("User:1", b"u".to_vec());
        store.commit(&batch).unwrap();

        let rows = store.scan("Partner:").unwrap();
        let keys: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Partner:1", "Partner:2"]);
    }

    #[test]
    fn delete_in_batch() {
        let (store, _dir) = open();
        let mut batch = WriteBatch::default();
        batch.put("User:1", b"u".to_vec());
        store.commit(&batch).unwrap();

        let mut batch = WriteBatch::default();
        batch.delete("User:1");
        store.commit(&batch).unwrap();
        assert!(store.get("User:1").unwrap().is_none());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persist.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            let mut batch = WriteBatch::default();
            batch.put("Company:1", b"c".to_vec());
            store.commit(&batch).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("Company:1").unwrap().unwrap(), b"c");
    }
}
