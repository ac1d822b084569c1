//! Default loadouts for monster instances that have not been equipped yet.
//!
//! The assigner reads three collections: live monster instances, monster
//! master records (for each type's element) and skill masters (to know which
//! skill ids exist). Every instance with fewer than [`FULL_LOADOUT`] skills
//! gets the element's default list, filtered to known skills.
//!
//! ## Example
//!
//! ```ignore
//! let outcome = LoadoutAssigner::new(&store)
//!     .with_unknown_skill_policy(UnknownSkillPolicy::Fail)
//!     .run()?;
//! println!("{outcome}");
//! ```

mod assigner;
mod table;

use std::str::FromStr;

use serde_json::Value;

use crate::store::Document;

/// An instance with this many equipped skills is complete.
pub const FULL_LOADOUT: usize = 4;

/// Document field names used by monster collections.
pub mod fields {
    pub const MONSTER_ID: &str = "monster_id";
    pub const USER_ID: &str = "user_id";
    pub const EQUIPPED_SKILLS: &str = "equipped_skills";
    pub const UPDATED_AT: &str = "updated_at";
    pub const NAME: &str = "name";
    pub const ELEMENT: &str = "element";
}

/// Element used when a monster master does not declare one.
pub const DEFAULT_ELEMENT: &str = "none";

/// Collection names the assigner reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadoutCollections {
    pub user_monsters: String,
    pub monster_masters: String,
    pub skill_masters: String,
}

impl Default for LoadoutCollections {
    fn default() -> Self {
        Self {
            user_monsters: "user_monsters".into(),
            monster_masters: "monster_masters".into(),
            skill_masters: "skill_masters".into(),
        }
    }
}

/// Monster type reference data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonsterMaster {
    pub id: String,
    pub name: Option<String>,
    pub element: String,
}

impl MonsterMaster {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.key.clone(),
            name: doc.str_field(fields::NAME).map(str::to_string),
            element: doc
                .str_field(fields::ELEMENT)
                .map(str::trim)
                .filter(|element| !element.is_empty())
                .unwrap_or(DEFAULT_ELEMENT)
                .to_string(),
        }
    }
}

/// A live monster instance owned by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMonster {
    pub key: String,
    pub user_id: Option<String>,
    /// Monster master key. Numeric ids are normalised to their decimal form.
    pub monster_id: Option<String>,
    pub equipped_skills: Vec<String>,
}

impl UserMonster {
    pub fn from_document(doc: &Document) -> Self {
        let equipped_skills = match doc.fields.get(fields::EQUIPPED_SKILLS) {
            Some(Value::Array(items)) => items.iter().map(id_string).collect(),
            _ => Vec::new(),
        };
        Self {
            key: doc.key.clone(),
            user_id: doc.str_field(fields::USER_ID).map(str::to_string),
            monster_id: doc
                .fields
                .get(fields::MONSTER_ID)
                .filter(|v| !v.is_null())
                .map(id_string),
            equipped_skills,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.equipped_skills.len() >= FULL_LOADOUT
    }
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What to do with default skill ids that are not in the skill master collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownSkillPolicy {
    /// Leave them out of the loadout and count them.
    #[default]
    Drop,
    /// Stop the run at the first instance whose loadout needs an unknown skill.
    Fail,
}

impl FromStr for UnknownSkillPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(UnknownSkillPolicy::Drop),
            "fail" => Ok(UnknownSkillPolicy::Fail),
            other => Err(format!("expected `drop` or `fail`, got `{other}`")),
        }
    }
}

pub use assigner::{
    AssignOutcome, Derived, Diagnostic, LoadoutAssigner, LoadoutError, LoadoutSample,
};
pub use table::LoadoutTable;
