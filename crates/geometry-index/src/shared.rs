//! Shared handle for hosts that index and query from several threads
//!
//! Queries take a read lock and may run concurrently; index, remove and clear take
//! the write lock, so every mutation is observed either completely or not at all.

use crate::{DocumentId, GeometryIndex, GeometryProvider, QueryRequest, Result};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable reader/writer handle around a [`GeometryIndex`]
#[derive(Debug, Clone, Default)]
pub struct SharedGeometryIndex {
    inner: Arc<RwLock<GeometryIndex>>,
}

impl SharedGeometryIndex {
    /// Wrap an index for shared use
    pub fn new(index: GeometryIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(index)),
        }
    }

    /// Run `f` with shared access to the index
    pub fn with_read<R>(&self, f: impl FnOnce(&GeometryIndex) -> R) -> R {
        #[cfg(feature = "profiling")]
        profiling::scope!("shared::with_read");

        f(&self.read_guard())
    }

    /// Run `f` with exclusive access to the index
    pub fn with_write<R>(&self, f: impl FnOnce(&mut GeometryIndex) -> R) -> R {
        #[cfg(feature = "profiling")]
        profiling::scope!("shared::with_write");

        f(&mut self.write_guard())
    }

    /// See [`GeometryIndex::index`]
    pub fn index<P: GeometryProvider + ?Sized>(&self, id: DocumentId, object: &P) -> bool {
        self.with_write(|index| index.index(id, object))
    }

    /// See [`GeometryIndex::remove`]
    pub fn remove(&self, id: DocumentId) -> bool {
        self.with_write(|index| index.remove(id))
    }

    /// See [`GeometryIndex::clear`]
    pub fn clear(&self) {
        self.with_write(GeometryIndex::clear);
    }

    /// See [`GeometryIndex::query`]
    pub fn query(&self, raw_bbox: &str, operator: Option<&str>) -> Result<BTreeSet<DocumentId>> {
        self.with_read(|index| index.query(raw_bbox, operator))
    }

    /// See [`GeometryIndex::apply`]
    pub fn apply(&self, request: &QueryRequest) -> Result<BTreeSet<DocumentId>> {
        self.with_read(|index| index.apply(request))
    }

    /// Owned copy of the stored WKT of a document
    pub fn get_geometry(&self, id: DocumentId) -> Option<String> {
        self.with_read(|index| index.get_geometry(id).map(str::to_string))
    }

    /// Number of indexed documents
    pub fn len(&self) -> usize {
        self.with_read(GeometryIndex::len)
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.with_read(GeometryIndex::is_empty)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, GeometryIndex> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Geometry index lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, GeometryIndex> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Geometry index lock poisoned; recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl From<GeometryIndex> for SharedGeometryIndex {
    fn from(index: GeometryIndex) -> Self {
        Self::new(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_shared_lifecycle() {
        let shared = SharedGeometryIndex::default();
        assert!(shared.index(1, "POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))"));
        assert_eq!(shared.len(), 1);
        assert!(shared.get_geometry(1).is_some());

        let hits = shared.query("0,0,5,5", Some("intersects")).unwrap();
        assert_eq!(hits.into_iter().collect::<Vec<_>>(), vec![1]);

        assert!(shared.remove(1));
        assert!(shared.is_empty());

        shared.index(2, "POINT(1 1)");
        shared.clear();
        assert!(shared.is_empty());
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let shared = SharedGeometryIndex::default();

        let writers: Vec<_> = (0..4u64)
            .map(|worker| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..50u64 {
                        let id = worker * 1000 + i;
                        shared.index(id, format!("POINT({} {})", i, worker).as_str());
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..2)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..20 {
                        let request = QueryRequest::new("0,0,100,100").with_operator("intersects");
                        let hits = shared.apply(&request).unwrap();
                        assert!(hits.len() <= 200);
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }

        assert_eq!(shared.len(), 200);
        shared.with_read(|index| assert!(index.check_consistency().is_empty()));
        assert_eq!(
            shared.query("-1,-1,100,100", Some("within")).unwrap().len(),
            200
        );
    }

    #[test]
    fn test_recovers_from_poisoned_lock() {
        let shared = SharedGeometryIndex::default();
        shared.index(1, "POINT(0 0)");

        let clone = shared.clone();
        let result = thread::spawn(move || {
            clone.with_write(|_| panic!("writer failed"));
        })
        .join();
        assert!(result.is_err());

        assert_eq!(shared.len(), 1);
        assert!(shared.index(2, "POINT(1 1)"));
    }
}
