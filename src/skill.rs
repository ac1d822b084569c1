//! Skill master records and the element enumeration they share with monsters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::store::Fields;

/// Document field names used by skill master documents.
pub mod fields {
    pub const SKILL_ID: &str = "skill_id";
    pub const NAME: &str = "name";
    pub const CATEGORY: &str = "category";
    pub const ELEMENT: &str = "element";
    pub const COST: &str = "cost";
    pub const ACCURACY: &str = "accuracy";
    pub const DESCRIPTION: &str = "description";
    pub const SOURCE_SHARD: &str = "sourceShard";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Fields every skill record must carry.
pub const REQUIRED_FIELDS: [&str; 6] = [
    fields::SKILL_ID,
    fields::NAME,
    fields::ELEMENT,
    fields::COST,
    fields::ACCURACY,
    fields::DESCRIPTION,
];

/// Typed fields checked by [`SkillRecord::from_entry`].
const TYPED_FIELDS: [&str; 7] = [
    fields::SKILL_ID,
    fields::NAME,
    fields::CATEGORY,
    fields::ELEMENT,
    fields::COST,
    fields::ACCURACY,
    fields::DESCRIPTION,
];

/// Whether `value` fits the typed slot for `field`, normalising it in place.
fn coerce(field: &str, value: &mut Value) -> bool {
    if value.is_null() {
        return true;
    }
    match field {
        fields::COST | fields::ACCURACY => {
            if value.as_i64().is_some() {
                return true;
            }
            match value.as_f64() {
                Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
                    *value = Value::from(f as i64);
                    true
                }
                _ => false,
            }
        }
        fields::SKILL_ID if value.is_number() => {
            *value = Value::String(value.to_string());
            true
        }
        _ => value.is_string(),
    }
}

/// One skill master record as authored in a shard file.
///
/// Required fields are optional here so that a record missing one can still
/// be loaded and reported by the validator. Any other key the author wrote is
/// kept in `extra` and written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    #[serde(rename = "skill_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Logical name of the shard this record was loaded from.
    #[serde(rename = "sourceShard", default, skip_serializing_if = "Option::is_none")]
    pub source_shard: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Typed fields whose value had the wrong JSON type. The raw value sits in `extra`.
    #[serde(skip)]
    pub invalid_fields: Vec<&'static str>,
}

impl SkillRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Primary key, if the record has one.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Build a record from one shard entry, checking each typed field on its own.
    ///
    /// Numeric ids become strings and integral floats become integers. Any other
    /// type mismatch leaves the typed field empty, keeps the raw value in
    /// `extra` so it is written back as authored, and lists the field in
    /// `invalid_fields`.
    pub fn from_entry(mut entry: Map<String, Value>) -> Result<Self, serde_json::Error> {
        if entry
            .get(fields::SOURCE_SHARD)
            .is_some_and(|v| !v.is_string() && !v.is_null())
        {
            entry.remove(fields::SOURCE_SHARD);
        }

        let mut invalid = Vec::new();
        let mut raw = Map::new();
        for field in TYPED_FIELDS {
            let Some(value) = entry.get_mut(field) else {
                continue;
            };
            if !coerce(field, value) {
                if let Some(value) = entry.remove(field) {
                    raw.insert(field.to_string(), value);
                }
                invalid.push(field);
            }
        }

        let mut record: Self = serde_json::from_value(Value::Object(entry))?;
        record.extra.extend(raw);
        record.invalid_fields = invalid;
        Ok(record)
    }

    /// Required fields absent from this record, in declaration order.
    ///
    /// A field listed in `invalid_fields` is present, just malformed, so it is
    /// not reported here.
    pub fn missing_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        REQUIRED_FIELDS
            .into_iter()
            .filter(|field| !self.has(field) && !self.invalid_fields.contains(field))
    }

    fn has(&self, field: &str) -> bool {
        match field {
            fields::SKILL_ID => self.id.is_some(),
            fields::NAME => self.name.is_some(),
            fields::CATEGORY => self.category.is_some(),
            fields::ELEMENT => self.element.is_some(),
            fields::COST => self.cost.is_some(),
            fields::ACCURACY => self.accuracy.is_some(),
            fields::DESCRIPTION => self.description.is_some(),
            other => self.extra.get(other).is_some_and(|v| !v.is_null()),
        }
    }

    /// Document body for the store (timestamps are added by the store).
    pub fn to_fields(&self) -> Result<Fields, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "skill record serialized to {other}, expected an object"
            ))),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_element(mut self, element: impl Into<String>) -> Self {
        self.element = Some(element.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_cost(mut self, cost: i64) -> Self {
        self.cost = Some(cost);
        self
    }

    pub fn with_accuracy(mut self, accuracy: i64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Elemental attribute shared by skills and monster types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    Fire,
    Water,
    Thunder,
    Wind,
    Earth,
    Light,
    Dark,
    None,
}

impl Element {
    pub const ALL: [Element; 8] = [
        Element::Fire,
        Element::Water,
        Element::Thunder,
        Element::Wind,
        Element::Earth,
        Element::Light,
        Element::Dark,
        Element::None,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Element::Fire => "fire",
            Element::Water => "water",
            Element::Thunder => "thunder",
            Element::Wind => "wind",
            Element::Earth => "earth",
            Element::Light => "light",
            Element::Dark => "dark",
            Element::None => "none",
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive; surrounding whitespace is ignored.
impl FromStr for Element {
    type Err = UnknownElement;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Element::ALL
            .into_iter()
            .find(|element| element.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownElement(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown element: {0:?}")]
pub struct UnknownElement(pub String);
