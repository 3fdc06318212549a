use lookout_storage::{FileStorage, MemoryStorage, PostponeStorage, StorageLimits};

fn check_round_trip(storage: &dyn PostponeStorage) {
    let payload = br#"{"packets":[{"type":"valueDump"},{"type":"errorEvent"}]}"#;
    storage.put("session-a", payload).unwrap();
    storage.put("session-b", b"other").unwrap();

    assert_eq!(
        storage.take_and_clear("session-a").unwrap().as_deref(),
        Some(&payload[..])
    );
    assert_eq!(storage.take_and_clear("session-a").unwrap(), None);
    assert_eq!(
        storage.take_and_clear("session-b").unwrap().as_deref(),
        Some(&b"other"[..])
    );
}

#[test]
fn memory_round_trip_is_exact_and_single_use() {
    check_round_trip(&MemoryStorage::default());
}

#[test]
fn file_round_trip_is_exact_and_single_use() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("postponed"), StorageLimits::default()).unwrap();
    check_round_trip(&storage);
}

#[test]
fn file_entries_survive_a_new_storage_handle() {
    // A redirect may land on another worker process sharing the directory.
    let dir = tempfile::tempdir().unwrap();
    let first = FileStorage::new(dir.path(), StorageLimits::default()).unwrap();
    first.put("visitor", b"before redirect").unwrap();
    drop(first);

    let second = FileStorage::new(dir.path(), StorageLimits::default()).unwrap();
    assert_eq!(
        second.take_and_clear("visitor").unwrap().as_deref(),
        Some(&b"before redirect"[..])
    );
}

#[test]
fn missing_keys_read_as_absent() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path(), StorageLimits::default()).unwrap();
    assert_eq!(storage.take_and_clear("never-written").unwrap(), None);
    assert_eq!(MemoryStorage::default().take_and_clear("never-written").unwrap(), None);
}
