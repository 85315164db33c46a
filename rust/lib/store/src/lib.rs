//! Record persistence for the ORM.
//!
//! Records are stored as JSON bytes under `{model}:{id}` keys. Writes made
//! during a call are buffered in a [`TxOverlay`] and reach the backend in
//! one atomic [`RecordStore::commit`].

pub mod error;
pub mod memory;
pub mod overlay;
pub mod redb;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use overlay::{Mutation, TxOverlay, WriteBatch};
pub use redb::RedbStore;
pub use traits::RecordStore;
