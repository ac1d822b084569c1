//! InMemoryDocumentStore - BTreeMap-backed document store for testing and dry runs.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use super::batch::{apply_batch, check_len, Collection};
use super::{server_timestamp, Document, DocumentStore, Fields, StoreError, WriteBatch};

/// Scheduled commit failures.
///
/// After `skip` commit attempts succeed, the next `count` attempts fail with
/// either a transient or a permanent error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailurePlan {
    pub skip: usize,
    pub count: usize,
    pub transient: bool,
}

impl FailurePlan {
    /// Fail the attempt after `skip` successful ones, permanently.
    pub fn at(skip: usize) -> Self {
        Self {
            skip,
            count: 1,
            transient: false,
        }
    }

    /// Fail `count` consecutive attempts with a retryable error.
    pub fn transient(skip: usize, count: usize) -> Self {
        Self {
            skip,
            count,
            transient: true,
        }
    }

    fn next_failure(&mut self) -> Option<StoreError> {
        if self.skip > 0 {
            self.skip -= 1;
            return None;
        }
        if self.count == 0 {
            return None;
        }
        self.count -= 1;
        Some(if self.transient {
            StoreError::Unavailable("injected transient failure".into())
        } else {
            StoreError::Rejected("injected failure".into())
        })
    }
}

/// In-memory document store.
///
/// Clone-friendly via Arc: clones share storage, the commit log and the
/// failure plan.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<BTreeMap<String, Collection>>>,
    attempts: Arc<Mutex<Vec<usize>>>,
    failures: Arc<Mutex<FailurePlan>>,
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document directly, bypassing batches. Intended for fixtures.
    pub fn seed(
        &self,
        collection: &str,
        key: impl Into<String>,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("seed"))?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.into(), fields);
        Ok(())
    }

    /// Schedule commit failures. Replaces any previous plan.
    pub fn fail_commits(&self, plan: FailurePlan) -> Result<(), StoreError> {
        let mut failures = self
            .failures
            .lock()
            .map_err(|_| StoreError::LockPoisoned("failure plan"))?;
        *failures = plan;
        Ok(())
    }

    /// Operation counts of every batch submitted so far, failed ones included.
    pub fn commit_sizes(&self) -> Vec<usize> {
        self.attempts
            .lock()
            .map(|attempts| attempts.clone())
            .unwrap_or_default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::LockPoisoned("list"))?;

        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, fields)| Document::new(key.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|_| StoreError::LockPoisoned("get"))?;

        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(key))
            .map(|fields| Document::new(key, fields.clone())))
    }

    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.attempts
            .lock()
            .map_err(|_| StoreError::LockPoisoned("commit log"))?
            .push(batch.len());
        check_len(batch.len())?;

        if let Some(err) = self
            .failures
            .lock()
            .map_err(|_| StoreError::LockPoisoned("failure plan"))?
            .next_failure()
        {
            return Err(err);
        }

        let mut collections = self
            .collections
            .write()
            .map_err(|_| StoreError::LockPoisoned("commit"))?;

        let mut staged: BTreeMap<String, Collection> = BTreeMap::new();
        for op in batch.ops() {
            let name = op.collection();
            if !staged.contains_key(name) {
                let current = collections.get(name).cloned().unwrap_or_default();
                staged.insert(name.to_string(), current);
            }
        }

        apply_batch(&mut staged, batch, &server_timestamp())?;
        collections.extend(staged);
        Ok(())
    }

    fn store_name(&self) -> &str {
        "in-memory"
    }
}
