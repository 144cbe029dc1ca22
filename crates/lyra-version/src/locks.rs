use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lyra_types::FileId;

/// Keyed mutual exclusion, one lock per file.
///
/// Serializes version-number assignment and the last-version check for a
/// single file while leaving other files unblocked. Entries are dropped once
/// no caller holds or waits on them.
#[derive(Default)]
pub struct FileLocks {
    locks: Mutex<HashMap<FileId, Arc<Mutex<()>>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `file`.
    pub fn with_lock<T>(&self, file: FileId, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.locks.lock().expect("lock poisoned");
            Arc::clone(locks.entry(file).or_default())
        };

        let out = {
            let _held = lock.lock().expect("file lock poisoned");
            f()
        };

        let mut locks = self.locks.lock().expect("lock poisoned");
        // One reference in the map, one here: nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&file);
        }
        out
    }

    /// Number of files with a live lock entry.
    pub fn active(&self) -> usize {
        self.locks.lock().expect("lock poisoned").len()
    }
}
