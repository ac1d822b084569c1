//! Collection replacer: drain a collection and rewrite it from the working set.
//!
//! Both phases go through [`partition`] and commit one chunk at a time. A
//! chunk that fails stops the run; everything before it is committed and
//! nothing after it is attempted. Re-running with the same working set
//! converges on the same final contents.

use std::fmt;

use tracing::{debug, info, warn};

use crate::skill::{fields, SkillRecord};
use crate::store::{partition, BatchOp, DocumentStore, Fields, StoreError, WriteBatch, MAX_BATCH_OPS};

/// Which half of a replace a chunk belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Drain,
    Write,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Drain => f.write_str("drain"),
            Phase::Write => f.write_str("write"),
        }
    }
}

/// Work completed by a replace, or completed before it aborted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceProgress {
    pub deleted: usize,
    pub written: usize,
    /// Records without a primary key; they cannot be addressed and are not written.
    pub skipped: usize,
    pub chunks: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplaceError {
    #[error("failed to list `{collection}` before draining: {source}")]
    List {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to encode skill {id}: {source}")]
    Encode {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{phase} chunk {chunk} of `{collection}` failed after {attempts} attempt(s): {source}")]
    Chunk {
        collection: String,
        phase: Phase,
        chunk: usize,
        attempts: u32,
        progress: ReplaceProgress,
        #[source]
        source: StoreError,
    },
}

impl ReplaceError {
    /// Work that was committed before the failure.
    pub fn progress(&self) -> ReplaceProgress {
        match self {
            ReplaceError::Chunk { progress, .. } => *progress,
            ReplaceError::List { .. } | ReplaceError::Encode { .. } => ReplaceProgress::default(),
        }
    }
}

/// Replaces the full contents of a collection with a new working set.
pub struct CollectionReplacer<'a, S: ?Sized> {
    store: &'a S,
    batch_limit: usize,
    max_attempts: u32,
}

impl<'a, S: DocumentStore + ?Sized> CollectionReplacer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            batch_limit: MAX_BATCH_OPS,
            max_attempts: 1,
        }
    }

    /// Set the maximum operations per batch. Clamped to `1..=MAX_BATCH_OPS`.
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.clamp(1, MAX_BATCH_OPS);
        self
    }

    /// Set how many times a chunk is submitted when the store reports a
    /// transient error. `1` disables retry.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Drain `collection`, then write one document per record keyed by its id.
    ///
    /// Records sharing an id are written in order, so the last one wins.
    pub fn replace(
        &self,
        collection: &str,
        records: &[SkillRecord],
    ) -> Result<ReplaceProgress, ReplaceError> {
        let (docs, skipped) = encode(records)?;
        let mut progress = ReplaceProgress {
            skipped,
            ..ReplaceProgress::default()
        };

        self.drain(collection, &mut progress)?;
        self.write(collection, &docs, &mut progress)?;

        info!(
            collection,
            deleted = progress.deleted,
            written = progress.written,
            skipped = progress.skipped,
            chunks = progress.chunks,
            "collection replaced"
        );
        Ok(progress)
    }

    fn drain(&self, collection: &str, progress: &mut ReplaceProgress) -> Result<(), ReplaceError> {
        let keys = self
            .store
            .list_keys(collection)
            .map_err(|source| ReplaceError::List {
                collection: collection.to_string(),
                source,
            })?;

        if keys.is_empty() {
            info!(collection, "nothing to drain");
            return Ok(());
        }
        info!(collection, documents = keys.len(), "draining collection");

        for (index, chunk) in partition(&keys, self.batch_limit).enumerate() {
            let ops = chunk
                .iter()
                .map(|key| BatchOp::delete(collection, key.as_str()))
                .collect();
            self.commit_chunk(collection, Phase::Drain, index, ops, progress)?;
            progress.deleted += chunk.len();
            debug!(collection, deleted = progress.deleted, total = keys.len(), "drain chunk committed");
        }
        Ok(())
    }

    fn write(
        &self,
        collection: &str,
        docs: &[(String, Fields)],
        progress: &mut ReplaceProgress,
    ) -> Result<(), ReplaceError> {
        for (index, chunk) in partition(docs, self.batch_limit).enumerate() {
            let ops = chunk
                .iter()
                .map(|(key, body)| {
                    BatchOp::set(collection, key.as_str(), body.clone())
                        .with_server_timestamp(fields::CREATED_AT)
                        .with_server_timestamp(fields::UPDATED_AT)
                })
                .collect();
            self.commit_chunk(collection, Phase::Write, index, ops, progress)?;
            progress.written += chunk.len();
            debug!(collection, written = progress.written, total = docs.len(), "write chunk committed");
        }
        Ok(())
    }

    fn commit_chunk(
        &self,
        collection: &str,
        phase: Phase,
        chunk: usize,
        ops: Vec<BatchOp>,
        progress: &mut ReplaceProgress,
    ) -> Result<(), ReplaceError> {
        let fail = |attempts: u32, source: StoreError, progress: ReplaceProgress| {
            ReplaceError::Chunk {
                collection: collection.to_string(),
                phase,
                chunk,
                attempts,
                progress,
                source,
            }
        };

        let batch = WriteBatch::from_ops(ops).map_err(|err| fail(0, err, *progress))?;

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.store.commit(&batch) {
                Ok(()) => {
                    progress.chunks += 1;
                    return Ok(());
                }
                Err(err) if err.is_transient() && attempts < self.max_attempts => {
                    warn!(collection, %phase, chunk, attempts, error = %err, "chunk commit failed, retrying");
                }
                Err(err) => return Err(fail(attempts, err, *progress)),
            }
        }
    }
}

/// Encode every keyed record up front so a bad record cannot strand a drained collection.
fn encode(records: &[SkillRecord]) -> Result<(Vec<(String, Fields)>, usize), ReplaceError> {
    let mut docs = Vec::with_capacity(records.len());
    let mut skipped = 0;

    for record in records {
        let Some(id) = record.id() else {
            skipped += 1;
            warn!(shard = ?record.source_shard, "skill without skill_id cannot be written");
            continue;
        };
        let body = record.to_fields().map_err(|source| ReplaceError::Encode {
            id: id.to_string(),
            source,
        })?;
        docs.push((id.to_string(), body));
    }
    Ok((docs, skipped))
}
