use crate::replace::ReplaceError;
use crate::store::StoreError;

/// Why a skill import stopped.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("no skill records could be loaded")]
    EmptyWorkingSet,

    #[error("validation found {violations} problem(s); the store was not modified")]
    ValidationGate { violations: usize },

    #[error(transparent)]
    Replace(#[from] ReplaceError),

    #[error("verification read failed: {0}")]
    Verify(#[source] StoreError),
}
