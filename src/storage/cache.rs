//! In-memory file-existence cache.
//!
//! Keyed by (directory_id, stem, extension_id) and mapping to the file row
//! id. Exists purely to keep bulk upserts from probing the database for
//! every file; it is advisory and correctness never depends on it. Bounded
//! with FIFO eviction of the oldest 10% when full.

use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CAPACITY: usize = 100_000;

pub type FileKey = (i64, String, i64);

pub struct ExistenceCache {
    map: HashMap<FileKey, i64>,
    order: VecDeque<FileKey>,
    capacity: usize,
}

impl ExistenceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &FileKey) -> Option<i64> {
        self.map.get(key).copied()
    }

    pub fn insert(&mut self, key: FileKey, file_id: i64) {
        if self.map.insert(key.clone(), file_id).is_some() {
            return;
        }
        self.order.push_back(key);
        if self.map.len() > self.capacity {
            self.evict();
        }
    }

    pub fn remove(&mut self, key: &FileKey) {
        self.map.remove(key);
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn evict(&mut self) {
        let target = self.capacity / 10;
        let mut evicted = 0;
        while evicted < target {
            match self.order.pop_front() {
                // Stale queue entries (already removed) don't count.
                Some(key) => {
                    if self.map.remove(&key).is_some() {
                        evicted += 1;
                    }
                }
                None => break,
            }
        }
    }
}

impl Default for ExistenceCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
