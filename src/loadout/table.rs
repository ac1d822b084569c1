//! Element → default loadout table.

use std::collections::HashMap;

use crate::skill::Element;

const DEFAULT_LOADOUTS: [(Element, [&str; 4]); 8] = [
    (Element::Fire, ["skill_001", "skill_101", "skill_102", "skill_801"]),
    (Element::Water, ["skill_001", "skill_201", "skill_202", "skill_203"]),
    (Element::Thunder, ["skill_001", "skill_301", "skill_302", "skill_304"]),
    (Element::Wind, ["skill_001", "skill_401", "skill_402", "skill_404"]),
    (Element::Earth, ["skill_001", "skill_501", "skill_502", "skill_505"]),
    (Element::Light, ["skill_001", "skill_601", "skill_602", "skill_604"]),
    (Element::Dark, ["skill_001", "skill_701", "skill_702", "skill_704"]),
    (Element::None, ["skill_001", "skill_002", "skill_005", "skill_009"]),
];

const FALLBACK_LOADOUT: [&str; 4] = ["skill_001", "skill_002", "skill_005", "skill_007"];

/// One ordered skill list per known element plus a fallback for anything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadoutTable {
    by_element: HashMap<Element, Vec<String>>,
    fallback: Vec<String>,
}

impl Default for LoadoutTable {
    fn default() -> Self {
        Self {
            by_element: DEFAULT_LOADOUTS
                .iter()
                .map(|(element, ids)| (*element, to_owned(ids)))
                .collect(),
            fallback: to_owned(&FALLBACK_LOADOUT),
        }
    }
}

impl LoadoutTable {
    /// Replace the list for one element.
    pub fn with_entry(mut self, element: Element, ids: &[&str]) -> Self {
        self.by_element.insert(element, to_owned(ids));
        self
    }

    pub fn with_fallback(mut self, ids: &[&str]) -> Self {
        self.fallback = to_owned(ids);
        self
    }

    /// Candidate loadout for an element name. Unrecognised names get the fallback.
    pub fn for_element(&self, element: &str) -> &[String] {
        element
            .parse::<Element>()
            .ok()
            .and_then(|element| self.by_element.get(&element))
            .unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &[String] {
        &self.fallback
    }
}

fn to_owned(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| (*id).to_string()).collect()
}
