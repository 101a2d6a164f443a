//! Merkle Set: a sorted, duplicate-free collection of leaf hashes
//! committed to by a single root.
//!
//! Leaves are sorted ascending by hash before the tree is built. Each
//! parent is `SHA1(left ‖ right)`; an odd node at the end of a level is
//! carried up unchanged. The root of an empty set is the empty string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::hash::{leaf_hash, node_hash};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleSet {
    leaves: BTreeSet<String>,
}

impl MerkleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a set from raw leaves (fingerprints, signatures...).
    pub fn from_leaves<I, S>(leaves: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::new();
        for leaf in leaves {
            set.push(leaf.as_ref());
        }
        set
    }

    /// Insert a leaf. Returns false if it was already present.
    pub fn push(&mut self, leaf: &str) -> bool {
        self.leaves.insert(leaf_hash(leaf))
    }

    /// Remove a leaf. Returns false if it was absent.
    pub fn remove(&mut self, leaf: &str) -> bool {
        self.leaves.remove(&leaf_hash(leaf))
    }

    pub fn contains(&self, leaf: &str) -> bool {
        self.leaves.contains(&leaf_hash(leaf))
    }

    pub fn leaves_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    /// Leaf hashes in tree order.
    pub fn leaves(&self) -> Vec<String> {
        self.leaves.iter().cloned().collect()
    }

    pub fn root(&self) -> String {
        self.levels()
            .first()
            .and_then(|level| level.first().cloned())
            .unwrap_or_default()
    }

    /// Tree levels from the root (index 0) down to the leaves.
    pub fn levels(&self) -> Vec<Vec<String>> {
        if self.leaves.is_empty() {
            return Vec::new();
        }
        let mut levels = vec![self.leaves()];
        while levels[0].len() > 1 {
            let parent = levels[0]
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => node_hash(left, right),
                    [single] => single.clone(),
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.insert(0, parent);
        }
        levels
    }

    /// Number of edges between the root and the leaves.
    pub fn depth(&self) -> usize {
        self.levels().len().saturating_sub(1)
    }

    pub fn nodes_count(&self) -> usize {
        self.levels().iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ucoin_core::hash::sha1_hex;

    const A: &str = "2E69197FAB029D8669EF85E82457A1587CA0ED9C";
    const B: &str = "33BBFC0C67078D72AF128B5BA296CC530126F372";
    const C: &str = "C73882B64B7E72237A2F460CE9CAB76D19A8651E";

    #[test]
    fn empty_set() {
        let set = MerkleSet::new();
        assert_eq!(set.root(), "");
        assert_eq!(set.leaves_count(), 0);
        assert_eq!(set.depth(), 0);
        assert_eq!(set.nodes_count(), 0);
    }

    #[test]
    fn single_leaf_is_root() {
        let set = MerkleSet::from_leaves([C]);
        assert_eq!(set.root(), C);
        assert_eq!(set.depth(), 0);
    }

    #[test]
    fn root_of_three_carries_odd_node() {
        let set = MerkleSet::from_leaves([C, A, B]);
        let ab = sha1_hex(format!("{A}{B}").as_bytes());
        let root = sha1_hex(format!("{ab}{C}").as_bytes());
        assert_eq!(set.root(), root);
        assert_eq!(set.depth(), 2);
        assert_eq!(set.nodes_count(), 3 + 2 + 1);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let x = MerkleSet::from_leaves([A, B, C]);
        let y = MerkleSet::from_leaves([C, B, A]);
        assert_eq!(x.root(), y.root());
    }

    #[test]
    fn push_and_remove() {
        let mut set = MerkleSet::from_leaves([A, B]);
        let before = set.root();
        assert!(set.push(C));
        assert!(!set.push(&C.to_ascii_lowercase()));
        assert_eq!(set.leaves_count(), 3);
        assert!(set.remove(C));
        assert!(!set.remove(C));
        assert_eq!(set.root(), before);
    }

    #[test]
    fn non_hash_leaves_are_hashed() {
        let mut set = MerkleSet::new();
        set.push("-----BEGIN PGP SIGNATURE-----\nabc\n");
        assert_eq!(set.leaves(), vec![sha1_hex(b"-----BEGIN PGP SIGNATURE-----\nabc\n")]);
    }
}
