use crate::{CounterKey, CounterStore, Error, FileCounterStore, MemoryCounterStore, Provisioned};
use std::fs;

fn user_key() -> CounterKey {
    CounterKey::new(1, 1, "user")
}

fn run_provision_is_idempotent<S: CounterStore>(store: &S) {
    let key = user_key();
    assert!(!store.exists(&key).unwrap());
    assert_eq!(store.provision(&key).unwrap(), Provisioned::Created);
    assert!(store.exists(&key).unwrap());

    store.validated_write(&key, 0, 25).unwrap();
    assert_eq!(store.provision(&key).unwrap(), Provisioned::Existing(25));
    assert_eq!(store.read(&key).unwrap(), 25);
}

fn run_read_requires_provisioning<S: CounterStore>(store: &S) {
    let err = store.read(&user_key()).unwrap_err();
    assert!(matches!(err, Error::Storage { .. }), "{err:?}");
}

fn run_validated_write_rejects_stale_expectation<S: CounterStore>(store: &S) {
    let key = user_key();
    store.provision(&key).unwrap();
    store.validated_write(&key, 0, 10).unwrap();

    let err = store.validated_write(&key, 0, 20).unwrap_err();
    match err {
        Error::Consistency {
            expected, found, ..
        } => {
            assert_eq!(expected, 0);
            assert_eq!(found, 10);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(store.read(&key).unwrap(), 10);
}

fn run_validated_write_never_moves_back<S: CounterStore>(store: &S) {
    let key = user_key();
    store.provision(&key).unwrap();
    store.validated_write(&key, 0, 40).unwrap();

    let err = store.validated_write(&key, 40, 39).unwrap_err();
    assert!(matches!(err, Error::Storage { .. }), "{err:?}");
    assert_eq!(store.read(&key).unwrap(), 40);

    // Writing the same value is not a step back.
    store.validated_write(&key, 40, 40).unwrap();
    store.validated_write(&key, 40, 41).unwrap();
    assert_eq!(store.read(&key).unwrap(), 41);
}

fn run_keys_are_independent<S: CounterStore>(store: &S) {
    let user = user_key();
    let order = CounterKey::new(1, 2, "order");
    let other_source = CounterKey::new(2, 1, "user");
    for key in [&user, &order, &other_source] {
        store.provision(key).unwrap();
    }
    store.validated_write(&user, 0, 100).unwrap();
    assert_eq!(store.read(&order).unwrap(), 0);
    assert_eq!(store.read(&other_source).unwrap(), 0);
}

#[test]
fn memory_provision_is_idempotent() {
    run_provision_is_idempotent(&MemoryCounterStore::new());
}

#[test]
fn memory_read_requires_provisioning() {
    run_read_requires_provisioning(&MemoryCounterStore::new());
}

#[test]
fn memory_validated_write_rejects_stale_expectation() {
    run_validated_write_rejects_stale_expectation(&MemoryCounterStore::new());
}

#[test]
fn memory_validated_write_never_moves_back() {
    run_validated_write_never_moves_back(&MemoryCounterStore::new());
}

#[test]
fn memory_keys_are_independent() {
    run_keys_are_independent(&MemoryCounterStore::new());
}

#[test]
fn file_provision_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    run_provision_is_idempotent(&FileCounterStore::open(dir.path()).unwrap());
}

#[test]
fn file_read_requires_provisioning() {
    let dir = tempfile::tempdir().unwrap();
    run_read_requires_provisioning(&FileCounterStore::open(dir.path()).unwrap());
}

#[test]
fn file_validated_write_rejects_stale_expectation() {
    let dir = tempfile::tempdir().unwrap();
    run_validated_write_rejects_stale_expectation(&FileCounterStore::open(dir.path()).unwrap());
}

#[test]
fn file_validated_write_never_moves_back() {
    let dir = tempfile::tempdir().unwrap();
    run_validated_write_never_moves_back(&FileCounterStore::open(dir.path()).unwrap());
}

#[test]
fn file_keys_are_independent() {
    let dir = tempfile::tempdir().unwrap();
    run_keys_are_independent(&FileCounterStore::open(dir.path()).unwrap());
}

#[test]
fn file_value_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = user_key();
    {
        let store = FileCounterStore::open(dir.path()).unwrap();
        store.provision(&key).unwrap();
        store.validated_write(&key, 0, 500).unwrap();
        store.validated_write(&key, 500, 1_000).unwrap();
    }

    let reopened = FileCounterStore::open(dir.path()).unwrap();
    assert_eq!(reopened.read(&key).unwrap(), 1_000);
    assert_eq!(reopened.provision(&key).unwrap(), Provisioned::Existing(1_000));
}

#[test]
fn file_record_is_eight_big_endian_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCounterStore::open(dir.path()).unwrap();
    let key = user_key();
    store.provision(&key).unwrap();
    store.validated_write(&key, 0, 0x0102).unwrap();

    let path = dir.path().join("1.1.user.details");
    assert_eq!(fs::read(path).unwrap(), vec![0, 0, 0, 0, 0, 0, 1, 2]);
}

#[test]
fn file_rejects_malformed_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCounterStore::open(dir.path()).unwrap();
    let key = user_key();
    fs::write(store.record_path(&key), b"12345").unwrap();

    assert!(matches!(store.read(&key), Err(Error::Storage { .. })));
    assert!(matches!(
        store.validated_write(&key, 0, 1),
        Err(Error::Storage { .. })
    ));
}

#[test]
fn file_open_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b");
    let store = FileCounterStore::open(&nested).unwrap();
    assert!(nested.is_dir());
    assert_eq!(store.dir(), nested.as_path());
}

#[test]
fn file_open_rejects_plain_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("not-a-dir");
    fs::write(&file, b"x").unwrap();
    assert!(matches!(
        FileCounterStore::open(&file),
        Err(Error::Storage { .. })
    ));
}

#[test]
fn file_leaves_no_scratch_files_behind() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCounterStore::open(dir.path()).unwrap();
    let key = user_key();
    store.provision(&key).unwrap();
    store.validated_write(&key, 0, 7).unwrap();

    let names: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(names, vec!["1.1.user.details".to_string()]);
}
