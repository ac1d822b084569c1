//! Atomic write batches and the chunking helper that keeps them under the limit.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Fields, StoreError};

/// Hard upper bound on operations in a single atomic batch.
pub const MAX_BATCH_OPS: usize = 500;

/// One mutation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// Create or fully overwrite a document.
    Set {
        collection: String,
        key: String,
        fields: Fields,
        server_timestamps: Vec<String>,
    },
    /// Merge fields into an existing document. Fails if the document is missing.
    Update {
        collection: String,
        key: String,
        fields: Fields,
        server_timestamps: Vec<String>,
    },
    /// Remove a document. Removing a missing document is not an error.
    Delete { collection: String, key: String },
}

impl BatchOp {
    pub fn set(collection: impl Into<String>, key: impl Into<String>, fields: Fields) -> Self {
        BatchOp::Set {
            collection: collection.into(),
            key: key.into(),
            fields,
            server_timestamps: Vec::new(),
        }
    }

    pub fn update(collection: impl Into<String>, key: impl Into<String>, fields: Fields) -> Self {
        BatchOp::Update {
            collection: collection.into(),
            key: key.into(),
            fields,
            server_timestamps: Vec::new(),
        }
    }

    pub fn delete(collection: impl Into<String>, key: impl Into<String>) -> Self {
        BatchOp::Delete {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Ask the store to fill `field` with its own clock at commit time.
    ///
    /// Has no effect on deletes.
    pub fn with_server_timestamp(mut self, field: impl Into<String>) -> Self {
        match &mut self {
            BatchOp::Set {
                server_timestamps, ..
            }
            | BatchOp::Update {
                server_timestamps, ..
            } => server_timestamps.push(field.into()),
            BatchOp::Delete { .. } => {}
        }
        self
    }

    pub fn collection(&self) -> &str {
        match self {
            BatchOp::Set { collection, .. }
            | BatchOp::Update { collection, .. }
            | BatchOp::Delete { collection, .. } => collection,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            BatchOp::Set { key, .. } | BatchOp::Update { key, .. } | BatchOp::Delete { key, .. } => {
                key
            }
        }
    }
}

/// A bounded group of operations committed as a single unit.
///
/// `push` refuses to grow the batch past [`MAX_BATCH_OPS`], so a batch built
/// through this type can never be rejected for size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a batch from a prepared list of operations.
    pub fn from_ops(ops: Vec<BatchOp>) -> Result<Self, StoreError> {
        check_len(ops.len())?;
        Ok(Self { ops })
    }

    pub fn push(&mut self, op: BatchOp) -> Result<(), StoreError> {
        check_len(self.ops.len() + 1)?;
        self.ops.push(op);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}

pub(crate) fn check_len(len: usize) -> Result<(), StoreError> {
    if len > MAX_BATCH_OPS {
        return Err(StoreError::BatchTooLarge {
            len,
            limit: MAX_BATCH_OPS,
        });
    }
    Ok(())
}

/// Split `items` into consecutive groups of at most `limit` elements.
///
/// `limit` is clamped to `1..=MAX_BATCH_OPS`; order is preserved and the last
/// group may be shorter. An empty slice yields no groups.
pub fn partition<T>(items: &[T], limit: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(limit.clamp(1, MAX_BATCH_OPS))
}

pub(crate) type Collection = BTreeMap<String, Fields>;

/// Apply a batch to staged copies of the collections it touches.
///
/// `staged` must hold the current contents of every collection named in the
/// batch (missing entries are treated as empty). On error the staged copies are
/// left half-applied and must be discarded by the caller.
pub(crate) fn apply_batch(
    staged: &mut BTreeMap<String, Collection>,
    batch: &WriteBatch,
    timestamp: &Value,
) -> Result<(), StoreError> {
    for op in batch.ops() {
        let collection = staged.entry(op.collection().to_string()).or_default();
        match op {
            BatchOp::Set {
                key,
                fields,
                server_timestamps,
                ..
            } => {
                let mut doc = fields.clone();
                stamp(&mut doc, server_timestamps, timestamp);
                collection.insert(key.clone(), doc);
            }
            BatchOp::Update {
                collection: name,
                key,
                fields,
                server_timestamps,
            } => {
                let doc = collection
                    .get_mut(key)
                    .ok_or_else(|| StoreError::NotFound {
                        collection: name.clone(),
                        key: key.clone(),
                    })?;
                for (field, value) in fields {
                    doc.insert(field.clone(), value.clone());
                }
                stamp(doc, server_timestamps, timestamp);
            }
            BatchOp::Delete { key, .. } => {
                collection.remove(key);
            }
        }
    }
    Ok(())
}

fn stamp(doc: &mut Fields, fields: &[String], timestamp: &Value) {
    for field in fields {
        doc.insert(field.clone(), timestamp.clone());
    }
}
