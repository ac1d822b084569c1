//! Integration tests for the skill import: shards → validation → replace → verify.

mod fixtures;

use fixtures::{skill, skill_json, skills, write_shard};
use serde_json::Value;
use skill_sync::skill::fields;
use skill_sync::store::{FailurePlan, Fields};
use skill_sync::{
    validate, CollectionReplacer, DocumentStore, FileDocumentStore, ImportSettings,
    InMemoryDocumentStore, Phase, ReplaceError, SkillImport, SyncError, Violation,
    MAX_BATCH_OPS,
};

const COLLECTION: &str = "skill_masters";

/// Collection contents without the server-stamped timestamps.
fn contents<S: DocumentStore>(store: &S) -> Vec<(String, Fields)> {
    store
        .list(COLLECTION)
        .unwrap()
        .into_iter()
        .map(|mut doc| {
            doc.fields.remove(fields::CREATED_AT);
            doc.fields.remove(fields::UPDATED_AT);
            (doc.key, doc.fields)
        })
        .collect()
}

fn seed_old(store: &InMemoryDocumentStore, count: usize) {
    for i in 0..count {
        store.seed(COLLECTION, format!("old_{i:04}"), Fields::new()).unwrap();
    }
}

#[test]
fn replace_is_idempotent() {
    let store = InMemoryDocumentStore::new();
    seed_old(&store, 3);
    let records = skills(12);

    CollectionReplacer::new(&store).replace(COLLECTION, &records).unwrap();
    let first = contents(&store);
    let progress = CollectionReplacer::new(&store).replace(COLLECTION, &records).unwrap();

    assert_eq!(contents(&store), first);
    assert_eq!(progress.deleted, 12);
    assert_eq!(progress.written, 12);
}

#[test]
fn replace_leaves_exactly_the_working_set() {
    let store = InMemoryDocumentStore::new();
    seed_old(&store, 7);
    store.seed(COLLECTION, "skill_0001", Fields::new()).unwrap();
    let records = skills(5);

    CollectionReplacer::new(&store).replace(COLLECTION, &records).unwrap();

    let keys = store.list_keys(COLLECTION).unwrap();
    let expected: Vec<String> = records.iter().filter_map(|r| r.id().map(str::to_string)).collect();
    assert_eq!(keys, expected);

    let doc = store.get(COLLECTION, "skill_0001").unwrap().unwrap();
    assert_eq!(doc.str_field(fields::NAME), Some("Skill 1"));
    assert!(doc.str_field(fields::CREATED_AT).is_some());
    assert!(doc.str_field(fields::UPDATED_AT).is_some());
}

#[test]
fn every_commit_respects_the_batch_limit() {
    for count in [0usize, 1, 499, 500, 501, 1001] {
        let store = InMemoryDocumentStore::new();
        seed_old(&store, count);

        CollectionReplacer::new(&store)
            .replace(COLLECTION, &skills(count))
            .unwrap();

        let sizes = store.commit_sizes();
        let per_phase = count.div_ceil(MAX_BATCH_OPS);
        assert_eq!(sizes.len(), per_phase * 2, "{count} records");
        assert!(sizes.iter().all(|&size| (1..=MAX_BATCH_OPS).contains(&size)));
        assert_eq!(sizes.iter().sum::<usize>(), count * 2);
        assert_eq!(store.len(COLLECTION), count);
    }
}

#[test]
fn lowered_batch_limit_splits_further() {
    let store = InMemoryDocumentStore::new();

    let replacer = CollectionReplacer::new(&store).with_batch_limit(40);
    replacer.replace(COLLECTION, &skills(100)).unwrap();

    assert_eq!(store.commit_sizes(), [40, 40, 20]);
}

#[test]
fn failed_drain_chunk_stops_before_the_write_phase() {
    let store = InMemoryDocumentStore::new();
    seed_old(&store, 600);
    store.fail_commits(FailurePlan::at(1)).unwrap();

    let err = CollectionReplacer::new(&store)
        .replace(COLLECTION, &skills(10))
        .unwrap_err();

    match &err {
        ReplaceError::Chunk { phase, chunk, .. } => {
            assert_eq!(*phase, Phase::Drain);
            assert_eq!(*chunk, 1);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.progress().deleted, 500);
    assert_eq!(err.progress().written, 0);
    assert_eq!(store.len(COLLECTION), 100);
    assert_eq!(store.commit_sizes(), [500, 100]);
}

#[test]
fn transient_failures_are_retried_when_allowed() {
    let store = InMemoryDocumentStore::new();
    store.fail_commits(FailurePlan::transient(0, 2)).unwrap();

    let progress = CollectionReplacer::new(&store)
        .with_max_attempts(3)
        .replace(COLLECTION, &skills(3))
        .unwrap();

    assert_eq!(progress.written, 3);
    assert_eq!(store.commit_sizes(), [3, 3, 3]);
}

#[test]
fn validation_reports_every_problem_together() {
    let mut incomplete = skill("skill_a", "A", "fire", 2);
    incomplete.description = None;
    let records = vec![
        incomplete,
        skill("skill_b", "B", "water", 9),
        skill("skill_a", "A again", "fire", 1),
    ];

    let report = validate(&records);

    assert_eq!(report.checked, 3);
    assert_eq!(
        report.violations(),
        [
            Violation::MissingField {
                id: "skill_a".into(),
                field: fields::DESCRIPTION,
            },
            Violation::OutOfRange {
                id: "skill_b".into(),
                field: fields::COST,
                value: 9,
                min: 0,
                max: 7,
            },
            Violation::DuplicateId { id: "skill_a".into() },
        ]
    );
}

#[test]
fn two_shards_with_a_colliding_id() {
    let dir = tempfile::tempdir().unwrap();
    let common = write_shard(
        dir.path(),
        "common",
        vec![
            skill_json("skill_001", "Tackle", "none", 1),
            skill_json("skill_002", "Ember", "fire", 2),
            skill_json("skill_003", "Bubble", "water", 2),
        ],
    );
    let star5 = write_shard(
        dir.path(),
        "star5",
        vec![skill_json("skill_002", "Inferno", "fire", 6)],
    );
    let store = InMemoryDocumentStore::new();
    let settings = ImportSettings::new(dir.path()).with_shards(vec![common, star5]);

    let summary = SkillImport::new(&store, settings).run().unwrap();

    assert_eq!(summary.loaded, 4);
    assert_eq!(
        summary.violations,
        [Violation::DuplicateId { id: "skill_002".into() }]
    );
    assert_eq!(summary.written, 4);
    assert_eq!(summary.verified(), Some(3));

    let doc = store.get(COLLECTION, "skill_002").unwrap().unwrap();
    assert_eq!(doc.str_field(fields::NAME), Some("Inferno"));
    assert_eq!(doc.str_field(fields::SOURCE_SHARD), Some("star5"));

    let report = summary.verification.unwrap();
    assert_eq!(report.by_shard.get("common"), Some(&2));
    assert_eq!(report.by_shard.get("star5"), Some(&1));
    assert_eq!(report.by_element.get("fire"), Some(&1));
}

#[test]
fn badly_typed_record_is_flagged_and_its_shard_still_imported() {
    let dir = tempfile::tempdir().unwrap();
    let mut odd = skill_json("skill_002", "Ember", "fire", 2);
    odd["accuracy"] = serde_json::json!(95.5);
    let common = write_shard(
        dir.path(),
        "common",
        vec![
            skill_json("skill_001", "Tackle", "none", 1),
            odd,
            skill_json("skill_003", "Bubble", "water", 2),
        ],
    );
    let star5 = write_shard(
        dir.path(),
        "star5",
        vec![skill_json("skill_801", "Inferno", "fire", 6)],
    );
    let store = InMemoryDocumentStore::new();
    for id in ["skill_001", "skill_002", "skill_003", "skill_801"] {
        store.seed(COLLECTION, id, Fields::new()).unwrap();
    }
    let settings = ImportSettings::new(dir.path()).with_shards(vec![common, star5]);

    let summary = SkillImport::new(&store, settings).run().unwrap();

    assert_eq!(summary.loaded, 4);
    assert!(summary.load_errors.is_empty());
    assert_eq!(
        summary.violations,
        [Violation::InvalidType {
            id: "skill_002".into(),
            field: fields::ACCURACY,
        }]
    );
    assert_eq!(
        store.list_keys(COLLECTION).unwrap(),
        ["skill_001", "skill_002", "skill_003", "skill_801"]
    );
    let doc = store.get(COLLECTION, "skill_002").unwrap().unwrap();
    assert_eq!(doc.fields.get(fields::ACCURACY), Some(&serde_json::json!(95.5)));
    assert_eq!(doc.str_field(fields::SOURCE_SHARD), Some("common"));
}

#[test]
fn missing_and_broken_shards_do_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_shard(dir.path(), "common", vec![skill_json("skill_001", "Tackle", "none", 1)]);
    let broken_path = dir.path().join("broken.json");
    std::fs::write(&broken_path, "{ not json").unwrap();
    let broken = skill_sync::ShardSpec::new("broken", broken_path);
    let missing = skill_sync::ShardSpec::new("missing", dir.path().join("missing.json"));
    let store = InMemoryDocumentStore::new();
    let settings = ImportSettings::new(dir.path()).with_shards(vec![good, broken, missing]);

    let summary = SkillImport::new(&store, settings).run().unwrap();

    assert_eq!(summary.loaded, 1);
    assert_eq!(summary.load_errors.len(), 1);
    assert_eq!(summary.shards.len(), 3);
    assert_eq!(store.len(COLLECTION), 1);
}

#[test]
fn records_without_an_id_are_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut nameless = skill_json("x", "Mystery", "dark", 3);
    if let Value::Object(map) = &mut nameless {
        map.remove(fields::SKILL_ID);
    }
    let shard = write_shard(
        dir.path(),
        "common",
        vec![skill_json("skill_001", "Tackle", "none", 1), nameless],
    );
    let store = InMemoryDocumentStore::new();
    let settings = ImportSettings::new(dir.path()).with_shards(vec![shard]);

    let summary = SkillImport::new(&store, settings).run().unwrap();

    assert_eq!(summary.loaded, 2);
    assert_eq!(summary.written, 1);
    assert_eq!(summary.unkeyed, 1);
    assert_eq!(summary.verified(), Some(1));
}

#[test]
fn aborted_write_phase_keeps_partial_progress_in_summary() {
    let dir = tempfile::tempdir().unwrap();
    let shard = write_shard(
        dir.path(),
        "common",
        (0..3).map(|i| skill_json(&format!("skill_{i:03}"), "S", "fire", 1)).collect(),
    );
    let store = InMemoryDocumentStore::new();
    store.fail_commits(FailurePlan::at(0)).unwrap();
    let settings = ImportSettings::new(dir.path()).with_shards(vec![shard]);

    let failure = SkillImport::new(&store, settings).run().unwrap_err();

    match &failure.error {
        SyncError::Replace(ReplaceError::Chunk { phase, chunk, .. }) => {
            assert_eq!(*phase, Phase::Write);
            assert_eq!(*chunk, 0);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(failure.summary.loaded, 3);
    assert_eq!(failure.summary.written, 0);
    assert!(store.is_empty(COLLECTION));
}

#[test]
fn file_store_round_trip() {
    let shards = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    let shard = write_shard(
        shards.path(),
        "common",
        vec![
            skill_json("skill_001", "Tackle", "none", 1),
            skill_json("skill_101", "Ember", "fire", 2),
        ],
    );
    let settings = ImportSettings::new(shards.path()).with_shards(vec![shard]);

    {
        let store = FileDocumentStore::open(data.path()).unwrap();
        let summary = SkillImport::new(&store, settings.clone()).run().unwrap();
        assert_eq!(summary.verified(), Some(2));
    }

    let reopened = FileDocumentStore::open(data.path()).unwrap();
    assert_eq!(reopened.list_keys(COLLECTION).unwrap(), ["skill_001", "skill_101"]);
    let first = contents(&reopened);

    let summary = SkillImport::new(&reopened, settings).run().unwrap();
    assert_eq!(summary.deleted, 2);
    assert_eq!(contents(&reopened), first);
}
