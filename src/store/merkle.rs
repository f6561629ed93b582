//! Binary keccak256 Merkle tree over ordered leaves.
//!
//! Adjacent nodes are hashed pairwise; an odd node at the end of a level is carried up unchanged.
//! The root of an empty tree is [Hash::zero].

use crate::common::Hash;

/// Leaf hash of a key-value entry: `keccak(keccak(key) || keccak(value))`.
pub fn kv_leaf(key: &[u8], value: &[u8]) -> Hash {
    Hash::hash_parts(&[
        Hash::hash(key).as_bytes(),
        Hash::hash(value).as_bytes(),
    ])
}

#[inline]
fn node(l: &Hash, r: &Hash) -> Hash {
    Hash::hash_parts(&[l.as_bytes(), r.as_bytes()])
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|c| match c {
            [l, r] => node(l, r),
            [x] => *x,
            _ => unreachable!(),
        })
        .collect()
}

pub fn root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return *Hash::zero()
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = next_level(&level)
    }
    level[0]
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProofNode {
    /// Sibling sits on the left of the running hash.
    pub left: bool,
    pub hash: Hash,
}

/// Inclusion proof for one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MerkleProof {
    pub path: Vec<ProofNode>,
}

impl MerkleProof {
    /// Proof for `leaves[idx]`.
    pub fn new(leaves: &[Hash], mut idx: usize) -> Self {
        assert!(idx < leaves.len());
        let mut path = Vec::new();
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            if idx % 2 == 1 {
                path.push(ProofNode {
                    left: true,
                    hash: level[idx - 1],
                })
            } else if idx + 1 < level.len() {
                path.push(ProofNode {
                    left: false,
                    hash: level[idx + 1],
                })
            }
            level = next_level(&level);
            idx /= 2;
        }
        Self { path }
    }

    pub fn verify(&self, leaf: &Hash, root: &Hash) -> bool {
        let mut h = *leaf;
        for n in &self.path {
            h = if n.left { node(&n.hash, &h) } else { node(&h, &n.hash) }
        }
        &h == root
    }
}

#[test]
fn test_proofs_all_sizes() {
    for n in 1..9u8 {
        let leaves: Vec<Hash> = (0..n).map(|i| Hash::hash(&[i])).collect();
        let r = root(&leaves);
        for i in 0..n as usize {
            let p = MerkleProof::new(&leaves, i);
            assert!(p.verify(&leaves[i], &r));
            let other = Hash::hash(&[100]);
            assert!(!p.verify(&other, &r));
        }
    }
    assert_eq!(root(&[]), *Hash::zero());
}
