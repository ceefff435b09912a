// tests/task_store.rs

mod common;

use hdlflow::errors::HdlflowError;
use hdlflow::store::{FileTaskStore, TaskId, TaskStatus};
use tempfile::TempDir;

#[test]
fn create_then_count_and_find() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let parent = dir.path().join("project");
    let store = FileTaskStore::open(dir.path().join("tasks")).unwrap();

    let record = store
        .create(&parent, "Creating a new project.", "echo hi")
        .unwrap();

    assert_eq!(store.count().unwrap(), 1);

    let found = store.find_by_id(record.id).unwrap();
    assert_eq!(found.parent_directory, parent);
    assert_eq!(found.description, "Creating a new project.");
    assert_eq!(found.command, "echo hi");
    assert_eq!(found.status, TaskStatus::Pending);
}

#[test]
fn records_survive_independent_handles() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("tasks");

    let id = {
        let store = FileTaskStore::open(&root).unwrap();
        store.create(dir.path(), "job", "echo hi").unwrap().id
    };

    // A completely fresh handle (standing in for a new process) still sees
    // the record.
    let store = FileTaskStore::open(&root).unwrap();
    let record = store.find_by_id(id).unwrap();
    assert_eq!(record.id, id);
    assert_eq!(record.status, TaskStatus::Pending);
}

#[test]
fn find_missing_id_is_not_found() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let store = FileTaskStore::open(dir.path().join("tasks")).unwrap();

    match store.find_by_id(TaskId(42)) {
        Err(HdlflowError::TaskNotFound(id)) => assert_eq!(id, TaskId(42)),
        other => panic!("expected TaskNotFound, got {:?}", other.map(|r| r.id)),
    }
}

#[test]
fn ids_are_unique_and_increasing() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let store = FileTaskStore::open(dir.path().join("tasks")).unwrap();

    let a = store.create(dir.path(), "a", "echo a").unwrap();
    let b = store.create(dir.path(), "b", "echo b").unwrap();
    let c = store.create(dir.path(), "c", "echo c").unwrap();

    assert!(a.id < b.id);
    assert!(b.id < c.id);
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn drop_all_resets_the_store() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let store = FileTaskStore::open(dir.path().join("tasks")).unwrap();

    store.create(dir.path(), "a", "echo a").unwrap();
    store.create(dir.path(), "b", "echo b").unwrap();
    assert_eq!(store.count().unwrap(), 2);

    store.drop_all().unwrap();
    assert_eq!(store.count().unwrap(), 0);

    // Ids restart from scratch in an empty store.
    let record = store.create(dir.path(), "c", "echo c").unwrap();
    assert_eq!(record.id, TaskId(1));
}

#[test]
fn update_after_record_removal_is_not_found() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let store = FileTaskStore::open(dir.path().join("tasks")).unwrap();

    let mut record = store.create(dir.path(), "job", "echo hi").unwrap();

    // Simulate another process dropping the record while this handle still
    // holds it.
    store.drop_all().unwrap();

    record.status = TaskStatus::Completed;
    match store.update(&record) {
        Err(HdlflowError::TaskNotFound(id)) => assert_eq!(id, record.id),
        other => panic!("expected TaskNotFound, got {:?}", other.is_ok()),
    }

    // The removed record must not be resurrected by the failed update.
    match store.find_by_id(record.id) {
        Err(HdlflowError::TaskNotFound(id)) => assert_eq!(id, record.id),
        other => panic!("expected TaskNotFound, got {:?}", other.map(|r| r.id)),
    }
}

#[test]
fn update_rewrites_the_persisted_record() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let store = FileTaskStore::open(dir.path().join("tasks")).unwrap();

    let mut record = store.create(dir.path(), "job", "echo hi").unwrap();
    record.status = TaskStatus::Failed;
    record.errors = vec!["ERROR: boom".to_string()];
    store.update(&record).unwrap();

    let found = store.find_by_id(record.id).unwrap();
    assert_eq!(found.status, TaskStatus::Failed);
    assert_eq!(found.errors, vec!["ERROR: boom".to_string()]);
}
