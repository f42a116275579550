use std::fs;
use std::path::Path;

use kv_store::{KeyValueStore, KvStoreError, ValueType, MANIFEST_FILE_NAME};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tempfile::TempDir;

fn open_store() -> (TempDir, KeyValueStore) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let store = KeyValueStore::open(dir.path()).expect("store should open");
    (dir, store)
}

fn value_path(root: &Path, store: &KeyValueStore, key: &str) -> std::path::PathBuf {
    let info = store.info(key).expect("key should be in manifest");
    root.join(info.location)
}

#[test]
fn store_then_retrieve_round_trips_json_values() {
    let (_dir, mut store) = open_store();

    let cases = [
        ("user_data", json!({"name": "John", "age": 30, "city": "New York"})),
        ("numbers", json!([1, 2, 3, 4, 5])),
        ("message", json!("Hello, World!")),
        ("flag", json!(true)),
        ("nothing", Value::Null),
        ("pi", json!(3.25)),
    ];

    for (key, value) in &cases {
        store.store(key, value).expect("store should succeed");
    }

    for (key, value) in &cases {
        let retrieved = store
            .retrieve_value(key)
            .expect("retrieve should succeed")
            .expect("value should be present");
        assert_eq!(&retrieved, value, "round trip for {key}");
    }
}

#[test]
fn store_retrieve_delete_example() {
    let (_dir, mut store) = open_store();

    store.store("x", &json!({"a": 1})).expect("store should succeed");
    assert_eq!(
        store.retrieve_value("x").expect("retrieve should succeed"),
        Some(json!({"a": 1}))
    );

    store.delete("x").expect("delete should succeed");
    assert_eq!(store.retrieve_value("x").expect("retrieve should succeed"), None);
}

#[test]
fn typed_retrieve_deserializes_and_reports_type_mismatch() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Settings {
        debug: bool,
        api_url: String,
    }

    let (_dir, mut store) = open_store();
    let settings = Settings {
        debug: true,
        api_url: "https://api.example.com".to_string(),
    };
    store.store("config", &settings).expect("store should succeed");

    let loaded: Option<Settings> = store.retrieve("config").expect("retrieve should succeed");
    assert_eq!(loaded, Some(settings));

    let error = store
        .retrieve::<Vec<u32>>("config")
        .expect_err("object cannot be read as a list");
    assert!(matches!(error, KvStoreError::Deserialize { ref key, .. } if key == "config"));
}

#[test]
fn store_overwrites_existing_key() {
    let (dir, mut store) = open_store();

    store.store("thread_id", "thread_1").expect("first store");
    store.store("thread_id", "thread_2").expect("second store");

    let value: Option<String> = store.retrieve("thread_id").expect("retrieve");
    assert_eq!(value.as_deref(), Some("thread_2"));
    assert_eq!(store.list_keys().expect("list keys"), vec!["thread_id"]);

    let values_in_dir = fs::read_dir(dir.path().join("values"))
        .expect("values dir should exist")
        .count();
    assert_eq!(values_in_dir, 1);
}

#[test]
fn delete_is_idempotent() {
    let (_dir, mut store) = open_store();
    store.store("key", &json!(1)).expect("store");

    store.delete("key").expect("first delete");
    store.delete("key").expect("second delete must not fail");
    store.delete("never-stored").expect("unknown key delete is a no-op");

    assert!(!store.exists("key"));
}

#[test]
fn missing_value_file_is_pruned_on_list() {
    let (dir, mut store) = open_store();
    store.store("keep", &json!("a")).expect("store keep");
    store.store("lose", &json!("b")).expect("store lose");

    fs::remove_file(value_path(dir.path(), &store, "lose")).expect("remove value file");

    assert!(!store.exists("lose"));
    assert_eq!(store.list_keys().expect("list keys"), vec!["keep"]);
    assert!(store.info("lose").is_none());

    let stats = store.size_stats().expect("stats");
    assert_eq!(stats.pruned_entries, 1);
    assert_eq!(stats.key_count, 1);
}

#[test]
fn missing_value_file_is_pruned_on_retrieve_and_manifest_rewritten() {
    let (dir, mut store) = open_store();
    store.store("lose", &json!({"x": 1})).expect("store");
    fs::remove_file(value_path(dir.path(), &store, "lose")).expect("remove value file");

    assert_eq!(store.retrieve_value("lose").expect("retrieve"), None);

    let manifest: Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join(MANIFEST_FILE_NAME)).expect("read manifest"),
    )
    .expect("manifest should be json");
    assert_eq!(manifest, json!({}));

    let reopened = KeyValueStore::open(dir.path()).expect("reopen");
    assert!(reopened.info("lose").is_none());
}

#[test]
fn values_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let mut store = KeyValueStore::open(dir.path()).expect("open");
        store.store("thread_id", "thread_42").expect("store");
    }

    let mut store = KeyValueStore::open(dir.path()).expect("reopen");
    let value: Option<String> = store.retrieve("thread_id").expect("retrieve");
    assert_eq!(value.as_deref(), Some("thread_42"));
}

#[test]
fn corrupted_manifest_opens_as_empty_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join(MANIFEST_FILE_NAME), "{ not json").expect("write manifest");

    let mut store = KeyValueStore::open(dir.path()).expect("corrupted manifest must not fail");
    assert!(store.list_keys().expect("list keys").is_empty());

    store.store("fresh", &json!(1)).expect("store after recovery");
    assert!(store.exists("fresh"));
}

#[test]
fn corrupted_value_file_is_reported() {
    let (dir, mut store) = open_store();
    store.store("broken", &json!(1)).expect("store");
    fs::write(value_path(dir.path(), &store, "broken"), "nope").expect("corrupt value");

    let error = store
        .retrieve_value("broken")
        .expect_err("corrupted value file must fail");
    assert!(matches!(error, KvStoreError::ValueParse { .. }));
}

#[test]
fn value_file_is_human_inspectable() {
    let (dir, mut store) = open_store();
    store.store("user/name", &json!("ada")).expect("store");

    let info = store.info("user/name").expect("info");
    assert_eq!(info.location, "values/username.json");
    assert_eq!(info.value_type, ValueType::String);
    assert!(info.exists);

    let file: Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join(&info.location)).expect("read value file"),
    )
    .expect("value file should be json");
    assert_eq!(file["key"], "user/name");
    assert_eq!(file["value"], "ada");
    assert_eq!(file["location"], "values/username.json");
    assert_eq!(file["stored_at"], json!(info.stored_at));
}

#[test]
fn colliding_sanitized_keys_share_a_file_and_last_writer_wins() {
    let (_dir, mut store) = open_store();
    store.store("a/b", &json!("first")).expect("store a/b");
    store.store("ab", &json!("second")).expect("store ab");

    assert_eq!(
        store.retrieve_value("a/b").expect("retrieve a/b"),
        Some(json!("second"))
    );
}

#[test]
fn unsanitizable_key_keeps_its_random_file_across_overwrites() {
    let (_dir, mut store) = open_store();
    store.store("???", &json!(1)).expect("first store");
    let first = store.info("???").expect("info").location;

    store.store("???", &json!(2)).expect("second store");
    let second = store.info("???").expect("info").location;

    assert_eq!(first, second);
    assert_eq!(store.retrieve_value("???").expect("retrieve"), Some(json!(2)));
}

#[test]
fn size_stats_counts_value_files_and_manifest() {
    let (_dir, mut store) = open_store();
    store.store("one", &json!("1")).expect("store one");
    store.store("two", &json!([1, 2])).expect("store two");

    let stats = store.size_stats().expect("stats");
    assert_eq!(stats.file_count, 2);
    assert_eq!(stats.key_count, 2);
    assert!(stats.total_bytes > 0);
    assert!(stats.total_size_human().ends_with('B'));
    assert_eq!(stats.root, store.root());
}

#[test]
fn clear_removes_every_entry() {
    let (dir, mut store) = open_store();
    store.store("one", &json!(1)).expect("store one");
    store.store("two", &json!(2)).expect("store two");

    store.clear().expect("clear");

    assert!(store.list_keys().expect("list keys").is_empty());
    let remaining = fs::read_dir(dir.path().join("values"))
        .expect("values dir")
        .count();
    assert_eq!(remaining, 0);
}

#[test]
fn failed_value_write_leaves_manifest_untouched() {
    let (dir, mut store) = open_store();
    store.store("stable", &json!(1)).expect("store");

    fs::remove_dir_all(dir.path().join("values")).expect("remove values dir");

    let error = store
        .store("new", &json!(2))
        .expect_err("value write into a missing directory must fail");
    assert!(matches!(error, KvStoreError::Io { .. }));
    assert!(store.info("new").is_none());

    let manifest: Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join(MANIFEST_FILE_NAME)).expect("read manifest"),
    )
    .expect("manifest json");
    assert!(manifest.get("new").is_none());
    assert!(manifest.get("stable").is_some());
}

#[test]
fn failed_manifest_write_keeps_the_previous_value() {
    let (dir, mut store) = open_store();
    store.store("k", &json!("old")).expect("store old");
    let path = value_path(dir.path(), &store, "k");

    let manifest = dir.path().join(MANIFEST_FILE_NAME);
    fs::remove_file(&manifest).expect("remove manifest");
    fs::create_dir(&manifest).expect("block manifest with a directory");

    let error = store
        .store("k", &json!("new"))
        .expect_err("manifest write into a directory must fail");
    assert!(matches!(error, KvStoreError::Io { .. }));

    assert_eq!(store.retrieve_value("k").expect("retrieve"), Some(json!("old")));
    let on_disk: Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read value file")).expect("json");
    assert_eq!(on_disk["value"], json!("old"));

    let leftovers = fs::read_dir(dir.path().join("values"))
        .expect("list values dir")
        .count();
    assert_eq!(leftovers, 1);
}

#[test]
fn unreadable_value_directory_does_not_prune_entries() {
    let (dir, mut store) = open_store();
    store.store("kept", &json!(true)).expect("store");

    let values = dir.path().join("values");
    fs::remove_dir_all(&values).expect("remove values dir");
    fs::write(&values, "not a directory").expect("replace values dir with a file");

    assert!(store.exists("kept"));
    assert_eq!(store.list_keys().expect("list keys"), vec!["kept".to_string()]);
    assert!(matches!(
        store.retrieve_value("kept"),
        Err(KvStoreError::Io { .. })
    ));
    assert_eq!(store.size_stats().expect("stats").pruned_entries, 0);

    let manifest: Value = serde_json::from_str(
        &fs::read_to_string(dir.path().join(MANIFEST_FILE_NAME)).expect("read manifest"),
    )
    .expect("manifest json");
    assert!(manifest.get("kept").is_some());
}
