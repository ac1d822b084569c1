//! Master-data import: load shards, validate, replace the collection, verify.

use std::fmt;
use std::path::Path;

use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::replace::{CollectionReplacer, ReplaceError};
use crate::shard::{load_shards, ShardCount, ShardSpec, ShardStatus};
use crate::store::{DocumentStore, MAX_BATCH_OPS};
use crate::validate::{validate, ValidationPolicy, Violation};
use crate::verify::{verify, VerificationReport};

/// Default target collection for skill masters.
pub const SKILL_COLLECTION: &str = "skill_masters";

/// Knobs for one import run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub collection: String,
    pub shards: Vec<ShardSpec>,
    pub validation: ValidationPolicy,
    pub batch_limit: usize,
    pub max_attempts: u32,
}

impl ImportSettings {
    /// Standard shard set under `skills_dir`, warn-only validation, full-size batches.
    pub fn new(skills_dir: &Path) -> Self {
        Self {
            collection: SKILL_COLLECTION.to_string(),
            shards: ShardSpec::default_set(skills_dir),
            validation: ValidationPolicy::default(),
            batch_limit: MAX_BATCH_OPS,
            max_attempts: 1,
        }
    }

    pub fn with_shards(mut self, shards: Vec<ShardSpec>) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }
}

/// Everything a run did, including the parts of an aborted run that completed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub collection: String,
    pub shards: Vec<ShardCount>,
    pub load_errors: Vec<String>,
    pub loaded: usize,
    pub violations: Vec<Violation>,
    pub deleted: usize,
    pub written: usize,
    pub unkeyed: usize,
    pub verification: Option<VerificationReport>,
}

impl ImportSummary {
    /// Verified count, if verification ran.
    pub fn verified(&self) -> Option<usize> {
        self.verification.as_ref().map(|report| report.total)
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "== skill import: {} ==", self.collection)?;
        for shard in &self.shards {
            let note = match shard.status {
                ShardStatus::Loaded => "",
                ShardStatus::Missing => " (file not found)",
                ShardStatus::Failed => " (load error)",
            };
            writeln!(f, "  {}: {}{note}", shard.shard, shard.count)?;
        }
        for load_error in &self.load_errors {
            writeln!(f, "  ! {load_error}")?;
        }
        writeln!(f, "loaded:     {}", self.loaded)?;
        writeln!(f, "violations: {}", self.violations.len())?;
        for violation in &self.violations {
            writeln!(f, "  - {violation}")?;
        }
        writeln!(f, "deleted:    {}", self.deleted)?;
        writeln!(f, "written:    {}", self.written)?;
        if self.unkeyed > 0 {
            writeln!(f, "unkeyed:    {} (not written)", self.unkeyed)?;
        }
        match &self.verification {
            Some(report) => write!(f, "verified:   {report}"),
            None => writeln!(f, "verified:   -"),
        }
    }
}

/// An aborted run: the error plus what was completed before it.
#[derive(Debug)]
pub struct ImportFailure {
    pub summary: ImportSummary,
    pub error: SyncError,
}

impl fmt::Display for ImportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skill import into `{}` failed: {}", self.summary.collection, self.error)
    }
}

impl std::error::Error for ImportFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// One master-data refresh against an injected store.
pub struct SkillImport<'a, S: ?Sized> {
    store: &'a S,
    settings: ImportSettings,
}

impl<'a, S: DocumentStore + ?Sized> SkillImport<'a, S> {
    pub fn new(store: &'a S, settings: ImportSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    /// Load → validate → replace → verify.
    pub fn run(&self) -> Result<ImportSummary, ImportFailure> {
        let mut summary = ImportSummary {
            collection: self.settings.collection.clone(),
            ..ImportSummary::default()
        };
        info!(
            store = self.store.store_name(),
            collection = %self.settings.collection,
            shards = self.settings.shards.len(),
            "skill import started"
        );

        let loaded = load_shards(&self.settings.shards);
        summary.shards = loaded.counts.clone();
        summary.load_errors = loaded.errors.iter().map(ToString::to_string).collect();
        summary.loaded = loaded.total();
        let records = loaded.records;

        if records.is_empty() {
            return Err(self.fail(summary, SyncError::EmptyWorkingSet));
        }

        let report = validate(&records);
        let clean = report.is_clean();
        summary.violations = report.into_violations();
        if !clean {
            match self.settings.validation {
                ValidationPolicy::Warn => {
                    warn!(
                        violations = summary.violations.len(),
                        "continuing despite validation problems"
                    );
                }
                ValidationPolicy::Gate => {
                    let violations = summary.violations.len();
                    return Err(self.fail(summary, SyncError::ValidationGate { violations }));
                }
            }
        }

        let replaced = CollectionReplacer::new(self.store)
            .with_batch_limit(self.settings.batch_limit)
            .with_max_attempts(self.settings.max_attempts)
            .replace(&self.settings.collection, &records);
        match replaced {
            Ok(progress) => {
                summary.deleted = progress.deleted;
                summary.written = progress.written;
                summary.unkeyed = progress.skipped;
            }
            Err(err) => {
                record_progress(&mut summary, &err);
                return Err(self.fail(summary, err.into()));
            }
        }

        match verify(self.store, &self.settings.collection) {
            Ok(report) => {
                if !report.matches(summary.written) {
                    // duplicate ids collapse onto one document, so fewer is expected then
                    warn!(
                        written = summary.written,
                        present = report.total,
                        "verified count differs from written count"
                    );
                }
                summary.verification = Some(report);
            }
            Err(err) => return Err(self.fail(summary, SyncError::Verify(err))),
        }

        info!(
            deleted = summary.deleted,
            written = summary.written,
            verified = summary.verified(),
            "skill import finished"
        );
        Ok(summary)
    }

    fn fail(&self, summary: ImportSummary, error: SyncError) -> ImportFailure {
        error!(error = %error, "skill import aborted");
        ImportFailure { summary, error }
    }
}

fn record_progress(summary: &mut ImportSummary, err: &ReplaceError) {
    let progress = err.progress();
    summary.deleted = progress.deleted;
    summary.written = progress.written;
    summary.unkeyed = progress.skipped;
}
