//! Runtime configuration from the environment and the credentials file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::loadout::UnknownSkillPolicy;
use crate::pipeline::ImportSettings;
use crate::store::{FileDocumentStore, StoreError, MAX_BATCH_OPS};
use crate::validate::ValidationPolicy;

pub const CREDENTIALS_ENV: &str = "SKILL_SYNC_CREDENTIALS";
pub const FALLBACK_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const DEFAULT_CREDENTIALS_PATH: &str = "./serviceAccountKey.json";

pub const SKILLS_DIR_ENV: &str = "SKILL_SYNC_SKILLS_DIR";
pub const DEFAULT_SKILLS_DIR: &str = "assets/data/skills";

pub const VALIDATION_ENV: &str = "SKILL_SYNC_VALIDATION";
pub const UNKNOWN_SKILLS_ENV: &str = "SKILL_SYNC_UNKNOWN_SKILLS";
pub const BATCH_LIMIT_ENV: &str = "SKILL_SYNC_BATCH_LIMIT";
pub const MAX_ATTEMPTS_ENV: &str = "SKILL_SYNC_MAX_ATTEMPTS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("credentials file not readable at {}: {source}", .path.display())]
    CredentialsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("credentials file {} is invalid: {source}", .path.display())]
    CredentialsInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

/// Contents of the credentials file that matter here.
///
/// Service-account key files carry more fields; they are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub project_id: String,
    /// Where the file-backed store keeps its collections.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub credentials_path: PathBuf,
    pub credentials: Credentials,
    pub skills_dir: PathBuf,
    pub validation: ValidationPolicy,
    pub unknown_skills: UnknownSkillPolicy,
    pub batch_limit: usize,
    pub max_attempts: u32,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let credentials_path = var(CREDENTIALS_ENV)
            .or_else(|| var(FALLBACK_CREDENTIALS_ENV))
            .map_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_PATH), PathBuf::from);
        let credentials = read_credentials(&credentials_path)?;

        let validation = match var(VALIDATION_ENV) {
            Some(raw) => raw.parse::<ValidationPolicy>().map_err(|reason| ConfigError::InvalidValue {
                var: VALIDATION_ENV,
                reason,
            })?,
            None => ValidationPolicy::default(),
        };

        let unknown_skills = match var(UNKNOWN_SKILLS_ENV) {
            Some(raw) => raw.parse::<UnknownSkillPolicy>().map_err(|reason| ConfigError::InvalidValue {
                var: UNKNOWN_SKILLS_ENV,
                reason,
            })?,
            None => UnknownSkillPolicy::default(),
        };

        let batch_limit = match var(BATCH_LIMIT_ENV) {
            Some(raw) => parse_bounded(BATCH_LIMIT_ENV, &raw, 1, MAX_BATCH_OPS)?,
            None => MAX_BATCH_OPS,
        };

        let max_attempts = match var(MAX_ATTEMPTS_ENV) {
            Some(raw) => parse_bounded(MAX_ATTEMPTS_ENV, &raw, 1, 10)? as u32,
            None => 1,
        };

        Ok(Self {
            credentials_path,
            credentials,
            skills_dir: var(SKILLS_DIR_ENV)
                .map_or_else(|| PathBuf::from(DEFAULT_SKILLS_DIR), PathBuf::from),
            validation,
            unknown_skills,
            batch_limit,
            max_attempts,
        })
    }

    /// Store directory: `data_dir` from the credentials, else `.skill_sync/<project_id>`.
    pub fn data_dir(&self) -> PathBuf {
        self.credentials
            .data_dir
            .clone()
            .unwrap_or_else(|| Path::new(".skill_sync").join(&self.credentials.project_id))
    }

    pub fn open_store(&self) -> Result<FileDocumentStore, StoreError> {
        FileDocumentStore::open(self.data_dir())
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings::new(&self.skills_dir)
            .with_validation(self.validation)
            .with_batch_limit(self.batch_limit)
            .with_max_attempts(self.max_attempts)
    }
}

fn read_credentials(path: &Path) -> Result<Credentials, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::CredentialsUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::CredentialsInvalid {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_bounded(
    var: &'static str,
    raw: &str,
    min: usize,
    max: usize,
) -> Result<usize, ConfigError> {
    let invalid = || ConfigError::InvalidValue {
        var,
        reason: format!("expected an integer in {min}..={max}, got `{raw}`"),
    };
    let value: usize = raw.trim().parse().map_err(|_| invalid())?;
    if !(min..=max).contains(&value) {
        return Err(invalid());
    }
    Ok(value)
}
