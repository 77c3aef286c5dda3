//! Per-processor ring of `workers + 2` result slots (§4.C), grounded directly on
//! `cached_list.hpp`'s `newItem`/`item`/`release`/`latest` algorithm.

use crate::error::{CassError, CassResult};
use crate::result::ResultContainer;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// A slot in the ring: an id (0 means free) paired with a lockable result.
struct Entry {
    id: u64,
    result: Arc<RwLock<ResultContainer>>,
}

/// A borrowed slot handle: the shared, lockable result plus its owning id.
pub type ResultHandle = Arc<RwLock<ResultContainer>>;

struct Inner {
    list: Vec<Entry>,
    /// Index of the scan cursor, persisted across `new_item` calls (not reset each time).
    current: usize,
    /// Index of the slot currently promoted to "latest".
    latest: usize,
}

/// `W = workers + 2` preallocated slots, one CachedList per processor.
pub struct CachedList {
    inner: Mutex<Inner>,
}

impl CachedList {
    /// Builds a list of `workers + 2` slots, each a clone of `template`.
    pub fn new(template: ResultContainer, workers: usize) -> Self {
        let size = workers + 2;
        let list = (0..size)
            .map(|_| Entry {
                id: 0,
                result: Arc::new(RwLock::new(template.clone_deep())),
            })
            .collect();
        Self {
            inner: Mutex::new(Inner {
                list,
                current: 0,
                latest: 0,
            }),
        }
    }

    /// Reserves the first slot whose id is 0 and which is not the current latest, clears
    /// its result, stamps its id, and returns a handle. The scan cursor persists across
    /// calls and wraps at the end of the ring, matching `CachedList::newItem`.
    pub fn new_item(&self, id: u64) -> ResultHandle {
        let mut inner = self.inner.lock();
        let len = inner.list.len();
        loop {
            let at_latest = inner.current == inner.latest;
            let occupied = inner.list[inner.current].id != 0;
            if !occupied && !at_latest {
                break;
            }
            inner.current = (inner.current + 1) % len;
        }
        let idx = inner.current;
        inner.list[idx].id = id;
        let handle = inner.list[idx].result.clone();
        handle.write().clear();
        handle
    }

    /// Returns a handle to the most recently produced result.
    pub fn latest(&self) -> ResultHandle {
        let inner = self.inner.lock();
        inner.list[inner.latest].result.clone()
    }

    /// Returns the slot whose id equals `id`. Fails with `NoSuchId` if absent, matching the
    /// original's `logic_error` on a failed linear scan.
    pub fn item(&self, id: u64) -> CassResult<ResultHandle> {
        let inner = self.inner.lock();
        inner
            .list
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.result.clone())
            .ok_or(CassError::NoSuchId { id })
    }

    /// Frees the slot whose id equals `id` by resetting its id to 0.
    pub fn release(&self, id: u64) {
        let mut inner = self.inner.lock();
        if let Some(e) = inner.list.iter_mut().find(|e| e.id == id) {
            e.id = 0;
        }
    }

    /// Promotes the slot holding `id` to latest.
    pub fn promote_to_latest(&self, id: u64) {
        let mut inner = self.inner.lock();
        if let Some(idx) = inner.list.iter().position(|e| e.id == id) {
            inner.latest = idx;
        }
    }

    /// Number of slots currently borrowed (non-zero id), used by the invariant tests.
    pub fn borrowed_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.list.iter().filter(|e| e.id != 0).count()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().list.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_borrowed_slots_never_exceed_workers_plus_one() {
        let workers = 3;
        let list = CachedList::new(ResultContainer::value("v"), workers);
        let mut ids = Vec::new();
        for id in 1..=(workers as u64 + 1) {
            list.new_item(id);
            ids.push(id);
            assert!(list.borrowed_count() <= workers + 1);
        }
        assert_eq!(list.capacity(), workers + 2);
    }

    #[test]
    fn item_fails_after_release() {
        let list = CachedList::new(ResultContainer::value("v"), 2);
        list.new_item(7);
        assert!(list.item(7).is_ok());
        list.release(7);
        assert!(matches!(list.item(7), Err(CassError::NoSuchId { id: 7 })));
    }

    #[test]
    fn latest_promotion_is_visible() {
        let list = CachedList::new(ResultContainer::value("v"), 2);
        let h = list.new_item(5);
        h.write().set_value(42.0);
        list.promote_to_latest(5);
        assert_eq!(list.latest().read().get_value(), 42.0);
    }

    #[test]
    fn new_item_clears_reused_slot() {
        let list = CachedList::new(ResultContainer::value("v"), 1);
        let h1 = list.new_item(1);
        h1.write().set_value(99.0);
        list.release(1);
        let h2 = list.new_item(2);
        assert_eq!(h2.read().get_value(), 0.0);
    }
}
