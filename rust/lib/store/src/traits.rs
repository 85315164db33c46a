use crate::error::StoreError;
use crate::overlay::WriteBatch;

/// RecordStore is the durable layer under the ORM.
///
/// Keys follow a namespaced convention: `Partner:00000000000000000042`.
/// Reads are point lookups or prefix scans; writes only ever arrive as a
/// whole batch so that a call's changes land all at once or not at all.
pub trait RecordStore: Send + Sync {
    /// Get the value for a key. Returns None if the key does not exist.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Scan all keys matching a prefix. Returns sorted (key, value) pairs.
    fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StoreError>;

    /// Apply every mutation of the batch atomically.
    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError>;
}
