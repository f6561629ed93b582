use std::cell::Cell;
use std::collections::BTreeMap;

use super::{KVStore, KVStoreR, MultiStore, StoreKey};
use crate::params::{
    GAS_READ_COST_FLAT, GAS_READ_COST_PER_BYTE, GAS_WRITE_COST_FLAT,
    GAS_WRITE_COST_PER_BYTE,
};

/// Pending writes of one sub-store; `None` marks a deletion.
type Dirty = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

#[derive(Default)]
struct Stats {
    reads: Cell<u64>,
    read_bytes: Cell<u64>,
    writes: Cell<u64>,
    write_bytes: Cell<u64>,
}

impl Stats {
    fn read(&self, v: &Option<Vec<u8>>) {
        self.reads.set(self.reads.get() + 1);
        if let Some(v) = v {
            self.read_bytes.set(self.read_bytes.get() + v.len() as u64)
        }
    }

    fn write(&self, key: &[u8], v: Option<&[u8]>) {
        self.writes.set(self.writes.get() + 1);
        let n = key.len() + v.map(|v| v.len()).unwrap_or(0);
        self.write_bytes.set(self.write_bytes.get() + n as u64)
    }
}

/// A copy-on-write view over any [MultiStore]. Writes stay in the cache until [Self::write]
/// flushes them into the parent; dropping the cache discards them. Caches nest.
pub struct CacheMultiStore<'a> {
    parent: &'a mut dyn MultiStore,
    dirty: BTreeMap<StoreKey, Dirty>,
    stats: Stats,
}

impl<'a> CacheMultiStore<'a> {
    pub fn new(parent: &'a mut dyn MultiStore) -> Self {
        Self {
            parent,
            dirty: BTreeMap::new(),
            stats: Stats::default(),
        }
    }

    /// Gas charged for the store accesses made through this view so far.
    pub fn gas_used(&self) -> u64 {
        let s = &self.stats;
        s.reads.get() * GAS_READ_COST_FLAT +
            s.read_bytes.get() * GAS_READ_COST_PER_BYTE +
            s.writes.get() * GAS_WRITE_COST_FLAT +
            s.write_bytes.get() * GAS_WRITE_COST_PER_BYTE
    }

    /// Flush every pending write into the parent, in key order per store.
    pub fn write(mut self) {
        for (name, dirty) in self.dirty {
            let mut w = self.parent.writer(name);
            for (k, v) in dirty {
                match v {
                    Some(v) => w.set(&k, v),
                    None => w.delete(&k),
                }
            }
        }
    }
}

impl<'a> MultiStore for CacheMultiStore<'a> {
    fn reader(&self, name: StoreKey) -> Box<dyn KVStoreR + '_> {
        Box::new(CacheView {
            dirty: self.dirty.get(name),
            parent: self.parent.reader(name),
            stats: &self.stats,
        })
    }

    fn writer(&mut self, name: StoreKey) -> Box<dyn KVStore + '_> {
        Box::new(CacheViewMut {
            dirty: self.dirty.entry(name).or_default(),
            parent: self.parent.reader(name),
            stats: &self.stats,
        })
    }
}

struct CacheView<'b> {
    dirty: Option<&'b Dirty>,
    parent: Box<dyn KVStoreR + 'b>,
    stats: &'b Stats,
}

struct CacheViewMut<'b> {
    dirty: &'b mut Dirty,
    parent: Box<dyn KVStoreR + 'b>,
    stats: &'b Stats,
}

fn cached_get(
    dirty: Option<&Dirty>, parent: &dyn KVStoreR, stats: &Stats, key: &[u8],
) -> Option<Vec<u8>> {
    let v = match dirty.and_then(|d| d.get(key)) {
        Some(v) => v.clone(),
        None => parent.get(key),
    };
    stats.read(&v);
    v
}

fn cached_range(
    dirty: Option<&Dirty>, parent: &dyn KVStoreR, start: &[u8],
    end: Option<&[u8]>,
) -> Vec<(Vec<u8>, Vec<u8>)> {
    use std::ops::Bound::*;
    let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
        parent.range(start, end).into_iter().collect();
    if let Some(d) = dirty {
        let hi = match end {
            Some(e) => Excluded(e),
            None => Unbounded,
        };
        for (k, v) in d.range::<[u8], _>((Included(start), hi)) {
            match v {
                Some(v) => merged.insert(k.clone(), v.clone()),
                None => merged.remove(k),
            };
        }
    }
    merged.into_iter().collect()
}

impl<'b> KVStoreR for CacheView<'b> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        cached_get(self.dirty, &*self.parent, self.stats, key)
    }

    fn range(
        &self, start: &[u8], end: Option<&[u8]>,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        cached_range(self.dirty, &*self.parent, start, end)
    }
}

impl<'b> KVStoreR for CacheViewMut<'b> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        cached_get(Some(&*self.dirty), &*self.parent, self.stats, key)
    }

    fn range(
        &self, start: &[u8], end: Option<&[u8]>,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        cached_range(Some(&*self.dirty), &*self.parent, start, end)
    }
}

impl<'b> KVStore for CacheViewMut<'b> {
    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.stats.write(key, Some(value.as_slice()));
        self.dirty.insert(key.to_vec(), Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.stats.write(key, None);
        self.dirty.insert(key.to_vec(), None);
    }
}
