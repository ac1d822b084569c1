pub mod config;
mod error;
pub mod loadout;
pub mod logging;
pub mod pipeline;
pub mod replace;
pub mod shard;
pub mod skill;
pub mod store;
pub mod validate;
pub mod verify;

pub use config::{ConfigError, Credentials, SyncConfig};
pub use error::SyncError;
pub use loadout::{
    AssignOutcome, LoadoutAssigner, LoadoutError, LoadoutTable, UnknownSkillPolicy,
};
pub use pipeline::{ImportFailure, ImportSettings, ImportSummary, SkillImport, SKILL_COLLECTION};
pub use replace::{CollectionReplacer, Phase, ReplaceError, ReplaceProgress};
pub use shard::{load_shards, ShardSpec};
pub use skill::{Element, SkillRecord};
pub use store::{
    BatchOp, Document, DocumentStore, FileDocumentStore, InMemoryDocumentStore, StoreError,
    WriteBatch, MAX_BATCH_OPS,
};
pub use validate::{validate, ValidationPolicy, ValidationReport, Violation};
pub use verify::{verify, VerificationReport};
