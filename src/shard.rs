//! Source loader: reads skill shard files and concatenates them into one working set.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::skill::SkillRecord;

/// Standard shard set: logical name and description, in load order.
const DEFAULT_SHARDS: [(&str, &str); 6] = [
    ("common", "common skills"),
    ("star5", "5-star exclusive skills"),
    ("star4", "4-star exclusive skills"),
    ("star3", "3-star exclusive skills"),
    ("star2", "2-star exclusive skills"),
    ("shared", "shared skills"),
];

/// One shard file and the logical name its records are tagged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSpec {
    pub name: String,
    pub path: PathBuf,
    pub description: String,
}

impl ShardSpec {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            path: path.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The six standard shards (`skill_masters_<name>.json`) under `dir`.
    pub fn default_set(dir: &Path) -> Vec<Self> {
        DEFAULT_SHARDS
            .iter()
            .map(|(name, description)| {
                Self::new(*name, dir.join(format!("skill_masters_{name}.json")))
                    .with_description(*description)
            })
            .collect()
    }
}

/// Why a present shard file contributed nothing.
#[derive(Debug, thiserror::Error)]
pub enum LoadErrorKind {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed shard: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("entry {index} is not an object")]
    NotAnObject { index: usize },
    #[error("entry {index} could not be read: {source}")]
    Entry {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A shard, or one entry in it, that could not be loaded.
#[derive(Debug, thiserror::Error)]
#[error("shard `{shard}` ({}): {kind}", .path.display())]
pub struct LoadError {
    pub shard: String,
    pub path: PathBuf,
    #[source]
    pub kind: LoadErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardStatus {
    Loaded,
    Missing,
    Failed,
}

/// Per-shard record count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardCount {
    pub shard: String,
    pub count: usize,
    pub status: ShardStatus,
}

/// Result of loading every shard.
#[derive(Debug, Default)]
pub struct LoadedShards {
    /// Records in shard order, then file order.
    pub records: Vec<SkillRecord>,
    /// One entry per requested shard, in request order.
    pub counts: Vec<ShardCount>,
    pub errors: Vec<LoadError>,
}

impl LoadedShards {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn count_for(&self, shard: &str) -> Option<usize> {
        self.counts
            .iter()
            .find(|entry| entry.shard == shard)
            .map(|entry| entry.count)
    }
}

#[derive(Deserialize)]
struct ShardFile {
    #[serde(default)]
    skills: Option<Vec<Value>>,
}

/// Records read from one shard, plus entries that had to be left out.
struct ShardContents {
    records: Vec<SkillRecord>,
    rejected: Vec<LoadErrorKind>,
}

/// Load every shard in order.
///
/// Missing files count as zero records; unreadable or malformed files are
/// reported in [`LoadedShards::errors`] and also count as zero. Neither stops
/// the remaining shards from loading.
pub fn load_shards(specs: &[ShardSpec]) -> LoadedShards {
    let mut loaded = LoadedShards::default();

    for spec in specs {
        let (count, status) = match read_shard(&spec.path) {
            Ok(Some(ShardContents { records, rejected })) => {
                for kind in rejected {
                    let err = LoadError {
                        shard: spec.name.clone(),
                        path: spec.path.clone(),
                        kind,
                    };
                    warn!(error = %err, "shard entry skipped");
                    loaded.errors.push(err);
                }
                let count = records.len();
                loaded
                    .records
                    .extend(records.into_iter().map(|mut record| {
                        record.source_shard = Some(spec.name.clone());
                        record
                    }));
                info!(shard = %spec.name, count, "{} loaded", spec.description);
                (count, ShardStatus::Loaded)
            }
            Ok(None) => {
                warn!(shard = %spec.name, path = %spec.path.display(), "shard file not found");
                (0, ShardStatus::Missing)
            }
            Err(kind) => {
                let err = LoadError {
                    shard: spec.name.clone(),
                    path: spec.path.clone(),
                    kind,
                };
                warn!(error = %err, "shard skipped");
                loaded.errors.push(err);
                (0, ShardStatus::Failed)
            }
        };

        loaded.counts.push(ShardCount {
            shard: spec.name.clone(),
            count,
            status,
        });
    }

    info!(total = loaded.total(), shards = specs.len(), "skill shards loaded");
    loaded
}

fn read_shard(path: &Path) -> Result<Option<ShardContents>, LoadErrorKind> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let file: ShardFile = serde_json::from_str(&text)?;

    let mut contents = ShardContents {
        records: Vec::new(),
        rejected: Vec::new(),
    };
    for (index, entry) in file.skills.unwrap_or_default().into_iter().enumerate() {
        let Value::Object(entry) = entry else {
            contents.rejected.push(LoadErrorKind::NotAnObject { index });
            continue;
        };
        match SkillRecord::from_entry(entry) {
            Ok(record) => contents.records.push(record),
            Err(source) => contents.rejected.push(LoadErrorKind::Entry { index, source }),
        }
    }
    Ok(Some(contents))
}
