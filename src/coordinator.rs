//! Process-wide write coordinator.
//!
//! All catalog writes in a process go through one [`CatalogHandle`]: a
//! shared mutex around the store. Each logical operation takes the guard
//! exactly once at its entry and works on `&mut Catalog` for the duration,
//! so writers are fully serialized and no code path re-locks. Readers open
//! their own connections and are never blocked thanks to WAL.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::storage::Catalog;

#[derive(Clone)]
pub struct CatalogHandle {
    inner: Arc<Mutex<Catalog>>,
}

impl CatalogHandle {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            inner: Arc::new(Mutex::new(catalog)),
        }
    }

    pub fn open(path: &str) -> rusqlite::Result<Self> {
        Ok(Self::new(Catalog::open(path)?))
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        Ok(Self::new(Catalog::open_in_memory()?))
    }

    /// Run one operation under the write coordinator.
    pub fn with<R>(&self, f: impl FnOnce(&mut Catalog) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }
}
