use std::path::PathBuf;

/// Error type for document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A batch was submitted with more operations than the store accepts.
    #[error("batch of {len} operations exceeds the limit of {limit}")]
    BatchTooLarge { len: usize, limit: usize },

    /// An update targeted a document that does not exist.
    #[error("document not found: {collection}/{key}")]
    NotFound { collection: String, key: String },

    /// Collection names are used as file names by some backends.
    #[error("invalid collection name: {0:?}")]
    InvalidCollection(String),

    /// The underlying lock primitive was poisoned.
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// The store could not be reached; retrying may succeed.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the batch.
    #[error("commit rejected: {0}")]
    Rejected(String),

    #[error("store i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted collection could not be decoded.
    #[error("corrupt collection file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("document serialization error: {0}")]
    Serde(String),
}

impl StoreError {
    /// Whether the failed operation may succeed if submitted again unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}
