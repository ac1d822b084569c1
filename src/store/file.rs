//! FileDocumentStore - one JSON object file per collection under a data directory.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::batch::{apply_batch, check_len, Collection};
use super::{server_timestamp, Document, DocumentStore, StoreError, WriteBatch};

/// File-backed document store.
///
/// Each collection lives in `<root>/<collection>.json` as a JSON object mapping
/// document keys to field maps. A commit rewrites every touched collection
/// through a temporary file followed by a rename, so a batch confined to one
/// collection is applied atomically.
pub struct FileDocumentStore {
    root: PathBuf,
    name: String,
    write_guard: Mutex<()>,
}

impl FileDocumentStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        let name = format!("file:{}", root.display());
        Ok(Self {
            root,
            name,
            write_guard: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, StoreError> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidCollection(collection.to_string()));
        }
        Ok(self.root.join(format!("{collection}.json")))
    }

    fn read_collection(&self, collection: &str) -> Result<Collection, StoreError> {
        let path = self.collection_path(collection)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Collection::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })
    }

    fn write_collection(&self, collection: &str, docs: &Collection) -> Result<(), StoreError> {
        let path = self.collection_path(collection)?;
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(docs)?;
        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })
    }
}

impl DocumentStore for FileDocumentStore {
    fn list(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .read_collection(collection)?
            .into_iter()
            .map(|(key, fields)| Document::new(key, fields))
            .collect())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .read_collection(collection)?
            .remove(key)
            .map(|fields| Document::new(key, fields)))
    }

    fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        check_len(batch.len())?;
        let _guard = self
            .write_guard
            .lock()
            .map_err(|_| StoreError::LockPoisoned("commit"))?;

        let mut staged: BTreeMap<String, Collection> = BTreeMap::new();
        for op in batch.ops() {
            let name = op.collection();
            if !staged.contains_key(name) {
                staged.insert(name.to_string(), self.read_collection(name)?);
            }
        }

        apply_batch(&mut staged, batch, &server_timestamp())?;

        for (collection, docs) in &staged {
            self.write_collection(collection, docs)?;
            debug!(collection = %collection, documents = docs.len(), "collection file rewritten");
        }
        Ok(())
    }

    fn store_name(&self) -> &str {
        &self.name
    }
}
