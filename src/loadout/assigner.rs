use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    fields, LoadoutCollections, LoadoutTable, MonsterMaster, UnknownSkillPolicy, UserMonster,
};
use crate::store::{BatchOp, Document, DocumentStore, Fields, StoreError, WriteBatch};

/// A default loadout after filtering against known skills.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    /// Skills to equip, in slot order.
    pub skills: Vec<String>,
    /// Default skills that are not in the skill master collection.
    pub unknown: Vec<String>,
}

/// Why an instance was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    MissingMaster {
        instance: String,
        monster_id: Option<String>,
    },
    NoValidSkills {
        instance: String,
        element: String,
    },
    WriteFailed {
        instance: String,
        error: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MissingMaster {
                instance,
                monster_id: Some(monster_id),
            } => write!(f, "{instance}: no master data for monster {monster_id}"),
            Diagnostic::MissingMaster {
                instance,
                monster_id: None,
            } => write!(f, "{instance}: no monster_id"),
            Diagnostic::NoValidSkills { instance, element } => {
                write!(f, "{instance}: no valid skills for element {element}")
            }
            Diagnostic::WriteFailed { instance, error } => write!(f, "{instance}: {error}"),
        }
    }
}

/// One updated instance read back after the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadoutSample {
    pub instance: String,
    pub monster_name: Option<String>,
    pub element: String,
    pub equipped_skills: Vec<String>,
}

/// Counts and diagnostics for one assignment run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignOutcome {
    pub total: usize,
    pub updated: usize,
    pub already_complete: usize,
    pub missing_master: usize,
    pub no_valid_skills: usize,
    pub errors: usize,
    /// Unknown default skill ids left out of written loadouts.
    pub dropped_skill_ids: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub sample: Option<LoadoutSample>,
}

impl AssignOutcome {
    pub fn skipped(&self) -> usize {
        self.already_complete + self.missing_master + self.no_valid_skills
    }
}

impl fmt::Display for AssignOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "monsters:  {}", self.total)?;
        writeln!(f, "updated:   {}", self.updated)?;
        writeln!(
            f,
            "skipped:   {} (complete {}, no master {}, no valid skills {})",
            self.skipped(),
            self.already_complete,
            self.missing_master,
            self.no_valid_skills
        )?;
        writeln!(f, "errors:    {}", self.errors)?;
        if self.dropped_skill_ids > 0 {
            writeln!(f, "unknown skill ids dropped: {}", self.dropped_skill_ids)?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "  - {diagnostic}")?;
        }
        if let Some(sample) = &self.sample {
            writeln!(
                f,
                "sample: {} {} ({}) -> {}",
                sample.instance,
                sample.monster_name.as_deref().unwrap_or("Unknown"),
                sample.element,
                sample.equipped_skills.join(", ")
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadoutError {
    #[error("failed to read `{collection}`: {source}")]
    Read {
        collection: String,
        #[source]
        source: StoreError,
    },

    #[error("`{0}` is empty; there are no monsters to equip")]
    NoInstances(String),

    #[error("{instance} ({element}) needs unknown skills: {}", .missing.join(", "))]
    UnknownSkills {
        instance: String,
        element: String,
        missing: Vec<String>,
        progress: Box<AssignOutcome>,
    },
}

impl LoadoutError {
    /// Work completed before the run stopped, if any was attempted.
    pub fn progress(&self) -> Option<&AssignOutcome> {
        match self {
            LoadoutError::UnknownSkills { progress, .. } => Some(&**progress),
            LoadoutError::Read { .. } | LoadoutError::NoInstances(_) => None,
        }
    }
}

/// Equips default skills on every incomplete monster instance.
pub struct LoadoutAssigner<'a, S: ?Sized> {
    store: &'a S,
    table: LoadoutTable,
    policy: UnknownSkillPolicy,
    collections: LoadoutCollections,
}

impl<'a, S: DocumentStore + ?Sized> LoadoutAssigner<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            table: LoadoutTable::default(),
            policy: UnknownSkillPolicy::default(),
            collections: LoadoutCollections::default(),
        }
    }

    pub fn with_table(mut self, table: LoadoutTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_unknown_skill_policy(mut self, policy: UnknownSkillPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_collections(mut self, collections: LoadoutCollections) -> Self {
        self.collections = collections;
        self
    }

    /// Default loadout for `element`, split into known and unknown skill ids.
    pub fn derive(&self, element: &str, known: &HashSet<String>) -> Derived {
        let (skills, unknown): (Vec<String>, Vec<String>) = self
            .table
            .for_element(element)
            .iter()
            .cloned()
            .partition(|id| known.contains(id));
        Derived { skills, unknown }
    }

    /// Visit every instance once and equip the incomplete ones.
    pub fn run(&self) -> Result<AssignOutcome, LoadoutError> {
        let instances = self.read(&self.collections.user_monsters)?;
        if instances.is_empty() {
            return Err(LoadoutError::NoInstances(
                self.collections.user_monsters.clone(),
            ));
        }
        info!(monsters = instances.len(), "user monsters loaded");

        let known: HashSet<String> = self
            .read(&self.collections.skill_masters)?
            .into_iter()
            .map(|doc| doc.key)
            .collect();
        info!(skills = known.len(), "skill ids loaded");

        let masters: HashMap<String, MonsterMaster> = self
            .read(&self.collections.monster_masters)?
            .iter()
            .map(|doc| (doc.key.clone(), MonsterMaster::from_document(doc)))
            .collect();
        info!(masters = masters.len(), "monster masters loaded");

        let mut outcome = AssignOutcome {
            total: instances.len(),
            ..AssignOutcome::default()
        };
        let mut first_updated = None;

        for doc in &instances {
            let monster = UserMonster::from_document(doc);
            if self.assign(&monster, &masters, &known, &mut outcome)? && first_updated.is_none() {
                first_updated = Some(monster);
            }
            let visited = outcome.updated + outcome.skipped() + outcome.errors;
            if visited % 10 == 0 {
                debug!(visited, total = outcome.total, "equip progress");
            }
        }

        if let Some(monster) = first_updated {
            outcome.sample = self.sample(&monster, &masters);
        }

        info!(
            updated = outcome.updated,
            skipped = outcome.skipped(),
            errors = outcome.errors,
            "loadout assignment finished"
        );
        Ok(outcome)
    }

    /// Returns whether the instance was updated.
    fn assign(
        &self,
        monster: &UserMonster,
        masters: &HashMap<String, MonsterMaster>,
        known: &HashSet<String>,
        outcome: &mut AssignOutcome,
    ) -> Result<bool, LoadoutError> {
        if monster.is_complete() {
            outcome.already_complete += 1;
            return Ok(false);
        }

        let Some(master) = monster.monster_id.as_ref().and_then(|id| masters.get(id)) else {
            let diagnostic = Diagnostic::MissingMaster {
                instance: monster.key.clone(),
                monster_id: monster.monster_id.clone(),
            };
            warn!("{diagnostic}");
            outcome.missing_master += 1;
            outcome.diagnostics.push(diagnostic);
            return Ok(false);
        };

        let derived = self.derive(&master.element, known);
        if !derived.unknown.is_empty() {
            match self.policy {
                UnknownSkillPolicy::Drop => {
                    debug!(instance = %monster.key, unknown = ?derived.unknown, "dropping unknown skill ids");
                    outcome.dropped_skill_ids += derived.unknown.len();
                }
                UnknownSkillPolicy::Fail => {
                    return Err(LoadoutError::UnknownSkills {
                        instance: monster.key.clone(),
                        element: master.element.clone(),
                        missing: derived.unknown,
                        progress: Box::new(outcome.clone()),
                    });
                }
            }
        }

        if derived.skills.is_empty() {
            let diagnostic = Diagnostic::NoValidSkills {
                instance: monster.key.clone(),
                element: master.element.clone(),
            };
            warn!("{diagnostic}");
            outcome.no_valid_skills += 1;
            outcome.diagnostics.push(diagnostic);
            return Ok(false);
        }

        match self.write(&monster.key, &derived.skills) {
            Ok(()) => {
                outcome.updated += 1;
                Ok(true)
            }
            Err(err) => {
                let diagnostic = Diagnostic::WriteFailed {
                    instance: monster.key.clone(),
                    error: err.to_string(),
                };
                warn!("{diagnostic}");
                outcome.errors += 1;
                outcome.diagnostics.push(diagnostic);
                Ok(false)
            }
        }
    }

    fn write(&self, key: &str, skills: &[String]) -> Result<(), StoreError> {
        let mut body = Fields::new();
        body.insert(
            fields::EQUIPPED_SKILLS.to_string(),
            Value::from(skills.to_vec()),
        );
        let op = BatchOp::update(&self.collections.user_monsters, key, body)
            .with_server_timestamp(fields::UPDATED_AT);
        self.store.commit(&WriteBatch::from_ops(vec![op])?)
    }

    fn sample(
        &self,
        monster: &UserMonster,
        masters: &HashMap<String, MonsterMaster>,
    ) -> Option<LoadoutSample> {
        let stored = match self.store.get(&self.collections.user_monsters, &monster.key) {
            Ok(Some(doc)) => UserMonster::from_document(&doc),
            Ok(None) => return None,
            Err(err) => {
                warn!(instance = %monster.key, error = %err, "could not read back sample");
                return None;
            }
        };
        let master = stored.monster_id.as_ref().and_then(|id| masters.get(id));
        Some(LoadoutSample {
            instance: stored.key,
            monster_name: master.and_then(|m| m.name.clone()),
            element: master.map_or_else(|| super::DEFAULT_ELEMENT.to_string(), |m| m.element.clone()),
            equipped_skills: stored.equipped_skills,
        })
    }

    fn read(&self, collection: &str) -> Result<Vec<Document>, LoadoutError> {
        self.store
            .list(collection)
            .map_err(|source| LoadoutError::Read {
                collection: collection.to_string(),
                source,
            })
    }
}
