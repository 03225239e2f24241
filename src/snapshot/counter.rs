use std::collections::HashMap;
use std::sync::Mutex;

/// Thread-safe occurrence counter for snapshot types. A single mutex guards
/// the whole map rather than one per key; snapshot-taking is low-frequency
/// and I/O-bound, so the lost concurrency doesn't matter.
#[derive(Debug, Default)]
pub struct SnapshotCounter {
    increments: Mutex<HashMap<String, u64>>,
}

impl SnapshotCounter {
    pub fn new() -> SnapshotCounter {
        SnapshotCounter::default()
    }

    /// Returns the next 1-indexed sequence number for `type_key`, adding the
    /// key on first use. This is the sole mutator of the map; counts are
    /// never decremented or reset for the life of the instance.
    pub fn next_sequence(&self, type_key: &str) -> u64 {
        let mut increments = self.increments.lock().unwrap();
        let count = increments.entry(type_key.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}
