//! Versioned multi-store: named, isolated key-value sub-stores with copy-on-write views.
//!
//! The working state ([MemMultiStore]) holds each sub-store behind an [Arc], so taking a snapshot
//! is a handful of reference-count bumps and a sub-store is only deep-copied the first time it is
//! written after a snapshot. Transactions run against a [CacheMultiStore] layered on top of it; the
//! cache is either flushed with [CacheMultiStore::write] or dropped. [CommitMultiStore] publishes
//! immutable versions together with their Merkle roots.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

mod cache;
pub mod merkle;

pub use cache::CacheMultiStore;
use merkle::MerkleProof;

use crate::common::Hash;

pub type StoreKey = &'static str;

/// Read half of a key-value store. Iteration is in ascending byte order of the key.
pub trait KVStoreR {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// All entries with `start <= key < end` (`end = None` means unbounded).
    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let end = prefix_end(prefix);
        self.range(prefix, end.as_deref())
    }

    fn iter_prefix_rev(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut v = self.iter_prefix(prefix);
        v.reverse();
        v
    }
}

/// Write half of a key-value store.
pub trait KVStore: KVStoreR {
    fn set(&mut self, key: &[u8], value: Vec<u8>);
    fn delete(&mut self, key: &[u8]);
}

/// A set of named sub-stores. Asking for a store that was not mounted is a programming error and
/// aborts.
pub trait MultiStore {
    fn reader(&self, name: StoreKey) -> Box<dyn KVStoreR + '_>;
    fn writer(&mut self, name: StoreKey) -> Box<dyn KVStore + '_>;
}

/// Smallest key greater than every key starting with `prefix`, `None` if there is none.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end)
        }
    }
    None
}

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

impl KVStoreR for Tree {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        BTreeMap::get(self, key).cloned()
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)> {
        use std::ops::Bound::*;
        let hi = match end {
            Some(e) => Excluded(e),
            None => Unbounded,
        };
        BTreeMap::range::<[u8], _>(self, (Included(start), hi))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl KVStore for Tree {
    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        self.insert(key.to_vec(), value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.remove(key);
    }
}

impl<'a, T: KVStoreR + ?Sized> KVStoreR for &'a T {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)> {
        (**self).range(start, end)
    }
}

impl<'a, T: KVStoreR + ?Sized> KVStoreR for &'a mut T {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn range(&self, start: &[u8], end: Option<&[u8]>) -> Vec<(Vec<u8>, Vec<u8>)> {
        (**self).range(start, end)
    }
}

impl<'a, T: KVStore + ?Sized> KVStore for &'a mut T {
    fn set(&mut self, key: &[u8], value: Vec<u8>) {
        (**self).set(key, value)
    }

    fn delete(&mut self, key: &[u8]) {
        (**self).delete(key)
    }
}

/// In-memory multi-store with copy-on-write sub-stores. Cloning is cheap.
#[derive(Clone, Default)]
pub struct MemMultiStore {
    stores: BTreeMap<StoreKey, Arc<Tree>>,
}

impl MemMultiStore {
    pub fn new(names: &[StoreKey]) -> Self {
        Self {
            stores: names.iter().map(|n| (*n, Arc::new(Tree::new()))).collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = StoreKey> + '_ {
        self.stores.keys().copied()
    }

    fn tree(&self, name: StoreKey) -> &Arc<Tree> {
        self.stores
            .get(name)
            .unwrap_or_else(|| panic!("store {} is not mounted", name))
    }
}

impl MultiStore for MemMultiStore {
    fn reader(&self, name: StoreKey) -> Box<dyn KVStoreR + '_> {
        Box::new(&**self.tree(name))
    }

    fn writer(&mut self, name: StoreKey) -> Box<dyn KVStore + '_> {
        let tree = self
            .stores
            .get_mut(name)
            .unwrap_or_else(|| panic!("store {} is not mounted", name));
        Box::new(Arc::make_mut(tree))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CommitId {
    pub version: u64,
    pub hash: Hash,
}

/// An immutable committed version.
pub struct Snapshot {
    pub id: CommitId,
    stores: MemMultiStore,
    roots: Vec<(StoreKey, Hash)>,
}

/// Answer to a query against a committed version.
#[derive(Debug)]
pub struct QueryResult {
    pub height: u64,
    pub value: Option<Vec<u8>>,
    /// Present iff `value` is.
    pub proof: Option<StoreProof>,
}

/// Proof that `key -> value` is in `store`, and that `store`'s root is part of the app hash.
#[derive(Clone, Debug)]
pub struct StoreProof {
    pub store: StoreKey,
    pub store_root: Hash,
    pub leaf: MerkleProof,
    pub root: MerkleProof,
}

impl StoreProof {
    pub fn verify(&self, key: &[u8], value: &[u8], app_hash: &Hash) -> bool {
        self.leaf.verify(&merkle::kv_leaf(key, value), &self.store_root) &&
            self.root.verify(
                &merkle::kv_leaf(self.store.as_bytes(), self.store_root.as_bytes()),
                app_hash,
            )
    }
}

impl Snapshot {
    fn new(id: CommitId, stores: MemMultiStore, roots: Vec<(StoreKey, Hash)>) -> Self {
        Self { id, stores, roots }
    }

    pub fn stores(&self) -> &MemMultiStore {
        &self.stores
    }

    pub fn query(&self, name: StoreKey, key: &[u8]) -> QueryResult {
        let height = self.id.version;
        let tree = match self.stores.stores.get(name) {
            Some(t) => t,
            None => {
                return QueryResult {
                    height,
                    value: None,
                    proof: None,
                }
            }
        };
        let value = KVStoreR::get(&**tree, key);
        let proof = value.as_ref().map(|_| {
            use std::ops::Bound::*;
            let idx = BTreeMap::range::<[u8], _>(
                &**tree,
                (Unbounded, Excluded(key)),
            )
            .count();
            let leaves: Vec<Hash> =
                tree.iter().map(|(k, v)| merkle::kv_leaf(k, v)).collect();
            let sidx = self
                .roots
                .iter()
                .position(|(n, _)| *n == name)
                .unwrap_or_else(|| panic!("no root for store {}", name));
            let store_root = self.roots[sidx].1;
            StoreProof {
                store: name,
                store_root,
                leaf: MerkleProof::new(&leaves, idx),
                root: MerkleProof::new(&root_leaves(&self.roots), sidx),
            }
        });
        QueryResult {
            height,
            value,
            proof,
        }
    }
}

fn root_leaves(roots: &[(StoreKey, Hash)]) -> Vec<Hash> {
    roots
        .iter()
        .map(|(n, r)| merkle::kv_leaf(n.as_bytes(), r.as_bytes()))
        .collect()
}

/// The committed history, shareable with query threads.
pub type VersionMap = Arc<RwLock<BTreeMap<u64, Arc<Snapshot>>>>;

/// Working state plus the published versions.
pub struct CommitMultiStore {
    working: MemMultiStore,
    versions: VersionMap,
    last: Option<Arc<Snapshot>>,
}

impl CommitMultiStore {
    pub fn new(names: &[StoreKey]) -> Self {
        Self {
            working: MemMultiStore::new(names),
            versions: Arc::new(RwLock::new(BTreeMap::new())),
            last: None,
        }
    }

    #[inline(always)]
    pub fn working(&mut self) -> &mut MemMultiStore {
        &mut self.working
    }

    pub fn last_commit_id(&self) -> CommitId {
        self.last.as_ref().map(|s| s.id).unwrap_or_default()
    }

    /// Latest committed state (an empty store set before the first commit).
    pub fn latest(&self) -> MemMultiStore {
        match &self.last {
            Some(s) => s.stores.clone(),
            None => MemMultiStore::new(&self.working.names().collect::<Vec<_>>()),
        }
    }

    /// Publish the working state as the next version.
    pub fn commit(&mut self) -> CommitId {
        let version = self.last_commit_id().version + 1;
        let roots: Vec<(StoreKey, Hash)> = self
            .working
            .stores
            .iter()
            .map(|(name, tree)| {
                // untouched sub-stores share their tree with the previous version
                let prev = self.last.as_ref().and_then(|s| {
                    let i = s.roots.iter().position(|(n, _)| n == name)?;
                    match s.stores.stores.get(name) {
                        Some(t) if Arc::ptr_eq(t, tree) => Some(s.roots[i].1),
                        _ => None,
                    }
                });
                let root = prev.unwrap_or_else(|| {
                    merkle::root(
                        &tree.iter().map(|(k, v)| merkle::kv_leaf(k, v)).collect::<Vec<_>>(),
                    )
                });
                (*name, root)
            })
            .collect();
        let hash = merkle::root(&root_leaves(&roots));
        let id = CommitId { version, hash };
        let snap = Arc::new(Snapshot::new(id, self.working.clone(), roots));
        self.versions.write().insert(version, snap.clone());
        self.last = Some(snap);
        log::debug!("committed version {} root {}", version, hash);
        id
    }

    /// Handle for reading committed versions from other threads.
    pub fn versions(&self) -> VersionMap {
        self.versions.clone()
    }

    /// `version = 0` means the latest one.
    pub fn snapshot(&self, version: u64) -> Option<Arc<Snapshot>> {
        let versions = self.versions.read();
        if version == 0 {
            return versions.values().next_back().cloned()
        }
        versions.get(&version).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMES: &[StoreKey] = &["acc", "main"];

    #[test]
    fn test_prefix_end() {
        assert_eq!(prefix_end(&[1, 2]), Some(vec![1, 3]));
        assert_eq!(prefix_end(&[1, 0xff]), Some(vec![2]));
        assert_eq!(prefix_end(&[0xff, 0xff]), None);
    }

    #[test]
    fn test_iter_prefix() {
        let mut ms = MemMultiStore::new(NAMES);
        {
            let mut w = ms.writer("acc");
            w.set(&[1, 1], vec![1]);
            w.set(&[1, 2], vec![2]);
            w.set(&[2, 0], vec![3]);
        }
        let r = ms.reader("acc");
        let keys: Vec<_> = r.iter_prefix(&[1]).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![vec![1, 1], vec![1, 2]]);
        let rev: Vec<_> = r.iter_prefix_rev(&[1]).into_iter().map(|(_, v)| v).collect();
        assert_eq!(rev, vec![vec![2], vec![1]]);
        assert!(ms.reader("main").iter_prefix(&[]).is_empty());
    }

    #[test]
    fn test_commit_versions_and_proof() {
        let mut cms = CommitMultiStore::new(NAMES);
        cms.working().writer("acc").set(b"k1", b"v1".to_vec());
        let c1 = cms.commit();
        assert_eq!(c1.version, 1);
        cms.working().writer("acc").set(b"k1", b"v2".to_vec());
        cms.working().writer("acc").set(b"k2", b"v3".to_vec());
        let c2 = cms.commit();
        assert_ne!(c1.hash, c2.hash);

        // old version still readable
        let s1 = cms.snapshot(1).unwrap();
        assert_eq!(s1.query("acc", b"k1").value, Some(b"v1".to_vec()));
        let q = cms.snapshot(0).unwrap().query("acc", b"k2");
        assert_eq!(q.height, 2);
        let proof = q.proof.unwrap();
        assert!(proof.verify(b"k2", b"v3", &c2.hash));
        assert!(!proof.verify(b"k2", b"v4", &c2.hash));
        assert!(!proof.verify(b"k2", b"v3", &c1.hash));
        assert!(cms.snapshot(0).unwrap().query("acc", b"nope").proof.is_none());
    }

    #[test]
    fn test_commit_is_deterministic() {
        let build = |order: &[(&[u8], &[u8])]| {
            let mut cms = CommitMultiStore::new(NAMES);
            for (k, v) in order {
                cms.working().writer("main").set(k, v.to_vec());
            }
            cms.commit().hash
        };
        assert_eq!(
            build(&[(b"a", b"1"), (b"b", b"2")]),
            build(&[(b"b", b"2"), (b"a", b"1")])
        );
    }
}
