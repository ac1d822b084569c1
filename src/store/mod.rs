//! Document store - the single source of truth the sync pipeline reads and writes.
//!
//! Collections hold JSON documents addressed by string keys. All mutations go
//! through [`DocumentStore::commit`], which applies a [`WriteBatch`] as one
//! atomic unit and never accepts more than [`MAX_BATCH_OPS`] operations.
//!
//! ## Example
//!
//! ```ignore
//! use skill_sync::store::{BatchOp, DocumentStore, InMemoryDocumentStore, WriteBatch};
//!
//! let store = InMemoryDocumentStore::new();
//! let mut batch = WriteBatch::new();
//! batch.push(BatchOp::set("skill_masters", "skill_001", fields).with_server_timestamp("updatedAt"))?;
//! store.commit(&batch)?;
//! let docs = store.list("skill_masters")?;
//! ```

mod batch;
mod error;
mod file;
mod in_memory;

use serde_json::{Map, Value};

/// Field map of a single document.
pub type Fields = Map<String, Value>;

/// A stored document together with its key.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub fields: Fields,
}

impl Document {
    pub fn new(key: impl Into<String>, fields: Fields) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// String value of a field, if present and a string.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Abstract document storage.
///
/// Implementations must apply each committed batch atomically: either every
/// operation in it takes effect or none does.
pub trait DocumentStore: Send + Sync {
    /// Full scan of a collection, ordered by key. A missing collection is empty.
    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError>;

    /// Fetch one document. Returns None if it does not exist.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Apply a batch atomically. Stamps requested server timestamp fields.
    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError>;

    /// Human-readable backend name, used in logs.
    fn store_name(&self) -> &str;

    /// Keys of every document in a collection, ordered.
    fn list_keys(&self, collection: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .list(collection)?
            .into_iter()
            .map(|doc| doc.key)
            .collect())
    }
}

/// Server clock value used for timestamp fields.
pub(crate) fn server_timestamp() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true))
}

pub use batch::{partition, BatchOp, WriteBatch, MAX_BATCH_OPS};
pub use error::StoreError;
pub use file::FileDocumentStore;
pub use in_memory::{FailurePlan, InMemoryDocumentStore};
