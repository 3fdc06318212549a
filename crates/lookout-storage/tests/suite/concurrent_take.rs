use std::sync::{Arc, Barrier};
use std::thread;

use lookout_storage::{FileStorage, MemoryStorage, PostponeStorage, StorageLimits};

const READERS: usize = 8;
const ROUNDS: usize = 20;

/// Races `READERS` threads on one key per round; exactly one may win.
fn assert_at_most_once(storage: Arc<dyn PostponeStorage>) {
    for round in 0..ROUNDS {
        let key = format!("race-{round}");
        storage.put(&key, b"payload").unwrap();

        let barrier = Arc::new(Barrier::new(READERS));
        let handles: Vec<_> = (0..READERS)
            .map(|_| {
                let storage = Arc::clone(&storage);
                let barrier = Arc::clone(&barrier);
                let key = key.clone();
                thread::spawn(move || {
                    barrier.wait();
                    storage.take_and_clear(&key).unwrap()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(Option::is_some)
            .count();
        assert_eq!(winners, 1, "round {round}");
    }
}

#[test]
fn memory_take_is_at_most_once_under_contention() {
    assert_at_most_once(Arc::new(MemoryStorage::default()));
}

#[test]
fn file_take_is_at_most_once_under_contention() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path(), StorageLimits::default()).unwrap();
    assert_at_most_once(Arc::new(storage));
}
