//! Shard files and skill records for the import suite.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use skill_sync::{ShardSpec, SkillRecord};

/// A record with every required field set to an in-range value.
pub fn skill(id: &str, name: &str, element: &str, cost: i64) -> SkillRecord {
    SkillRecord::new(id)
        .with_name(name)
        .with_element(element)
        .with_category("attack")
        .with_cost(cost)
        .with_accuracy(95)
        .with_description(format!("{name} hits the target"))
}

pub fn skills(count: usize) -> Vec<SkillRecord> {
    (0..count)
        .map(|i| skill(&format!("skill_{i:04}"), &format!("Skill {i}"), "fire", (i % 8) as i64))
        .collect()
}

pub fn skill_json(id: &str, name: &str, element: &str, cost: i64) -> Value {
    json!({
        "skill_id": id,
        "name": name,
        "category": "attack",
        "element": element,
        "cost": cost,
        "accuracy": 100,
        "description": format!("{name} hits the target"),
    })
}

/// Write `{"skills": [...]}` to `<dir>/<name>.json`.
pub fn write_shard(dir: &Path, name: &str, skills: Vec<Value>) -> ShardSpec {
    let path = dir.join(format!("{name}.json"));
    fs::write(&path, json!({ "skills": skills }).to_string()).unwrap();
    ShardSpec::new(name, path)
}
