use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasherDefault;

use crate::page::StoreId;

pub(crate) type AHashMap<K, V> = HashMap<K, V, BuildHasherDefault<ahash::AHasher>>;

/// Opaque handle returned by [`BlockCache::open`](crate::BlockCache::open).
/// Values are never reused, so a closed handle stays invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct OpenStore<S> {
    pub store: S,
    pub id: StoreId,
    pub cursor: u64,
}

/// Open handles and the stores behind them.
pub(crate) struct HandleTable<S> {
    open: AHashMap<Handle, OpenStore<S>>,
    next: u64,
}

impl<S> HandleTable<S> {
    pub fn new() -> Self {
        Self {
            open: AHashMap::default(),
            next: 1,
        }
    }

    pub fn insert(&mut self, store: S, id: StoreId) -> Handle {
        let handle = Handle(self.next);
        self.next += 1;
        self.open.insert(
            handle,
            OpenStore {
                store,
                id,
                cursor: 0,
            },
        );
        handle
    }

    pub fn remove(&mut self, handle: Handle) -> Option<OpenStore<S>> {
        self.open.remove(&handle)
    }

    pub fn get(&self, handle: Handle) -> Option<&OpenStore<S>> {
        self.open.get(&handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut OpenStore<S>> {
        self.open.get_mut(&handle)
    }

    /// Any open handle on `id`, for persisting pages the caller no longer names.
    pub fn find_store_mut(&mut self, id: StoreId) -> Option<&mut OpenStore<S>> {
        self.open.values_mut().find(|open| open.id == id)
    }

    pub fn has_store(&self, id: StoreId) -> bool {
        self.open.values().any(|open| open.id == id)
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_not_reused() {
        let mut table = HandleTable::new();
        let a = table.insert((), StoreId(0));
        table.remove(a).unwrap();
        let b = table.insert((), StoreId(0));
        assert_ne!(a, b);
        assert!(table.get(a).is_none());
        assert_eq!(table.get(b).unwrap().cursor, 0);
    }

    #[test]
    fn test_find_store() {
        let mut table = HandleTable::new();
        table.insert("a", StoreId(0));
        let b = table.insert("b", StoreId(1));
        assert_eq!(table.find_store_mut(StoreId(1)).unwrap().store, "b");
        assert!(table.find_store_mut(StoreId(2)).is_none());

        table.remove(b);
        assert!(!table.has_store(StoreId(1)));
        assert_eq!(table.len(), 1);
    }
}
