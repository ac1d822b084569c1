//! Integration tests for default loadout assignment.

use serde_json::{json, Value};
use skill_sync::loadout::UserMonster;
use skill_sync::store::Fields;
use skill_sync::{
    DocumentStore, FileDocumentStore, ImportSettings, InMemoryDocumentStore, LoadoutAssigner,
    LoadoutTable, ShardSpec, SkillImport,
};

fn obj(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => panic!("expected object"),
    }
}

/// Every skill id in the default table, so nothing is dropped.
fn all_default_skills() -> Vec<String> {
    let table = LoadoutTable::default();
    let mut ids: Vec<String> = ["fire", "water", "thunder", "wind", "earth", "light", "dark", "none"]
        .iter()
        .flat_map(|element| table.for_element(element).to_vec())
        .chain(table.fallback().to_vec())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

fn reference_data(store: &InMemoryDocumentStore) {
    for id in all_default_skills() {
        store.seed("skill_masters", id, Fields::new()).unwrap();
    }
    let masters = [
        ("1", "Salamander", "fire"),
        ("2", "Kappa", "Water"),
        ("3", "Golem", "earth"),
        ("4", "Prism", "crystal"),
    ];
    for (id, name, element) in masters {
        store
            .seed("monster_masters", id, obj(json!({"name": name, "element": element})))
            .unwrap();
    }
}

fn instances() -> Vec<(&'static str, Value)> {
    vec![
        ("u1_a", json!({"user_id": "u1", "monster_id": "1", "equipped_skills": []})),
        ("u1_b", json!({"user_id": "u1", "monster_id": 2})),
        ("u2_a", json!({"user_id": "u2", "monster_id": "3", "equipped_skills": ["skill_001"]})),
        ("u2_b", json!({"user_id": "u2", "monster_id": "4"})),
        ("u3_a", json!({"user_id": "u3", "monster_id": "77"})),
    ]
}

fn equipped<S: DocumentStore>(store: &S, key: &str) -> Vec<String> {
    let doc = store.get("user_monsters", key).unwrap().unwrap();
    UserMonster::from_document(&doc).equipped_skills
}

fn loadouts<S: DocumentStore>(store: &S) -> Vec<(String, Vec<String>)> {
    store
        .list("user_monsters")
        .unwrap()
        .iter()
        .map(|doc| (doc.key.clone(), UserMonster::from_document(doc).equipped_skills))
        .collect()
}

#[test]
fn equips_each_incomplete_instance_by_element() {
    let store = InMemoryDocumentStore::new();
    reference_data(&store);
    for (key, body) in instances() {
        store.seed("user_monsters", key, obj(body)).unwrap();
    }

    let outcome = LoadoutAssigner::new(&store).run().unwrap();

    assert_eq!(outcome.total, 5);
    assert_eq!(outcome.updated, 4);
    assert_eq!(outcome.missing_master, 1);
    assert_eq!(outcome.errors, 0);
    assert_eq!(outcome.dropped_skill_ids, 0);
    assert_eq!(equipped(&store, "u1_a"), ["skill_001", "skill_101", "skill_102", "skill_801"]);
    assert_eq!(equipped(&store, "u1_b"), ["skill_001", "skill_201", "skill_202", "skill_203"]);
    assert_eq!(equipped(&store, "u2_a"), ["skill_001", "skill_501", "skill_502", "skill_505"]);
    assert!(equipped(&store, "u3_a").is_empty());

    let sample = outcome.sample.unwrap();
    assert_eq!(sample.instance, "u1_a");
    assert_eq!(sample.monster_name.as_deref(), Some("Salamander"));
}

#[test]
fn unrecognised_element_gets_the_fallback() {
    let store = InMemoryDocumentStore::new();
    reference_data(&store);
    store
        .seed("user_monsters", "u2_b", obj(json!({"monster_id": "4"})))
        .unwrap();

    LoadoutAssigner::new(&store).run().unwrap();

    assert_eq!(equipped(&store, "u2_b"), LoadoutTable::default().fallback());
}

#[test]
fn second_run_changes_nothing() {
    let store = InMemoryDocumentStore::new();
    reference_data(&store);
    for (key, body) in instances() {
        store.seed("user_monsters", key, obj(body)).unwrap();
    }

    LoadoutAssigner::new(&store).run().unwrap();
    let after_first = store.list("user_monsters").unwrap();
    let commits = store.commit_sizes().len();

    let outcome = LoadoutAssigner::new(&store).run().unwrap();

    assert_eq!(outcome.updated, 0);
    assert_eq!(outcome.already_complete, 4);
    assert_eq!(store.list("user_monsters").unwrap(), after_first);
    assert_eq!(store.commit_sizes().len(), commits);
}

#[test]
fn result_does_not_depend_on_insertion_order() {
    let forward = InMemoryDocumentStore::new();
    let backward = InMemoryDocumentStore::new();
    reference_data(&forward);
    reference_data(&backward);
    for (key, body) in instances() {
        forward.seed("user_monsters", key, obj(body)).unwrap();
    }
    for (key, body) in instances().into_iter().rev() {
        backward.seed("user_monsters", key, obj(body)).unwrap();
    }

    let a = LoadoutAssigner::new(&forward).run().unwrap();
    let b = LoadoutAssigner::new(&backward).run().unwrap();

    assert_eq!(loadouts(&forward), loadouts(&backward));
    assert_eq!(a.updated, b.updated);
    assert_eq!(a.diagnostics, b.diagnostics);
}

#[test]
fn same_element_instances_get_identical_loadouts() {
    let store = InMemoryDocumentStore::new();
    reference_data(&store);
    store
        .seed("monster_masters", "5", obj(json!({"name": "Phoenix", "element": "FIRE"})))
        .unwrap();
    let bodies = [
        ("a", json!({"monster_id": "1"})),
        ("b", json!({"monster_id": "1", "equipped_skills": ["skill_001"]})),
        ("c", json!({"monster_id": 5, "equipped_skills": []})),
    ];
    for (key, body) in bodies.clone() {
        store.seed("user_monsters", key, obj(body)).unwrap();
    }

    LoadoutAssigner::new(&store).run().unwrap();

    let fire = equipped(&store, "a");
    assert_eq!(fire, ["skill_001", "skill_101", "skill_102", "skill_801"]);
    assert_eq!(equipped(&store, "b"), fire);
    assert_eq!(equipped(&store, "c"), fire);

    // without skill_102 every fire instance loses the same slot
    let trimmed = InMemoryDocumentStore::new();
    for id in ["skill_001", "skill_101", "skill_801"] {
        trimmed.seed("skill_masters", id, Fields::new()).unwrap();
    }
    for id in ["1", "5"] {
        trimmed
            .seed("monster_masters", id, obj(json!({"element": "fire"})))
            .unwrap();
    }
    for (key, body) in bodies {
        trimmed.seed("user_monsters", key, obj(body)).unwrap();
    }

    let outcome = LoadoutAssigner::new(&trimmed).run().unwrap();

    assert_eq!(outcome.updated, 3);
    assert_eq!(outcome.dropped_skill_ids, 3);
    let fire = equipped(&trimmed, "a");
    assert_eq!(fire, ["skill_001", "skill_101", "skill_801"]);
    assert_eq!(equipped(&trimmed, "b"), fire);
    assert_eq!(equipped(&trimmed, "c"), fire);
}

#[test]
fn import_then_equip_on_the_file_store() {
    let shards = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let skills: Vec<Value> = ["skill_001", "skill_201", "skill_202"]
        .iter()
        .map(|id| {
            json!({
                "skill_id": id,
                "name": id,
                "element": "water",
                "cost": 2,
                "accuracy": 90,
                "description": "splash",
            })
        })
        .collect();
    let path = shards.path().join("water.json");
    std::fs::write(&path, json!({ "skills": skills }).to_string()).unwrap();

    let store = FileDocumentStore::open(data.path()).unwrap();
    let settings =
        ImportSettings::new(shards.path()).with_shards(vec![ShardSpec::new("water", path)]);
    SkillImport::new(&store, settings).run().unwrap();

    let mut batch = skill_sync::WriteBatch::new();
    batch
        .push(skill_sync::BatchOp::set(
            "monster_masters",
            "9",
            obj(json!({"name": "Kappa", "element": "water"})),
        ))
        .unwrap();
    batch
        .push(skill_sync::BatchOp::set(
            "user_monsters",
            "m1",
            obj(json!({"user_id": "u1", "monster_id": 9, "equipped_skills": []})),
        ))
        .unwrap();
    store.commit(&batch).unwrap();

    let outcome = LoadoutAssigner::new(&store).run().unwrap();

    assert_eq!(outcome.updated, 1);
    assert_eq!(outcome.dropped_skill_ids, 1);
    let reopened = FileDocumentStore::open(data.path()).unwrap();
    assert_eq!(equipped(&reopened, "m1"), ["skill_001", "skill_201", "skill_202"]);
    let doc = reopened.get("user_monsters", "m1").unwrap().unwrap();
    assert_eq!(doc.str_field("user_id"), Some("u1"));
    assert!(doc.str_field("updated_at").is_some());
}
