//! Binary Merkle tree over 32-byte leaves.
//!
//! Layers with an odd number of nodes duplicate the trailing node, so every
//! node always has a sibling and proofs are a plain index-bit fold. The
//! full layer structure is retained so proofs can be generated for any leaf
//! after the root has been computed.

use thiserror::Error;

use crate::{
    buf::Buf32,
    hash::{hash_pair, sha256},
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MerkleError {
    /// A tree cannot be built over zero leaves.
    #[error("no leaves to build tree from")]
    EmptyTree,

    /// Proof requested for a leaf index outside the tree.
    #[error("leaf index {index} out of bounds for {leaves} leaves")]
    IndexOutOfBounds { index: usize, leaves: usize },
}

/// Merkle tree retaining all layers, leaves first.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<Buf32>>,
}

impl MerkleTree {
    /// Builds a tree from pre-hashed leaves.
    pub fn from_leaves(leaves: Vec<Buf32>) -> Result<Self, MerkleError> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyTree);
        }

        let mut layers = vec![leaves];
        loop {
            let prev = &layers[layers.len() - 1];
            if prev.len() == 1 {
                break;
            }
            let mut next = Vec::with_capacity(prev.len().div_ceil(2));
            for pair in prev.chunks(2) {
                // Odd layer: the trailing node is paired with itself.
                let right = pair.get(1).unwrap_or(&pair[0]);
                next.push(hash_pair(&pair[0], right));
            }
            layers.push(next);
        }

        Ok(Self { layers })
    }

    /// Builds a tree by hashing raw leaf payloads first.
    pub fn from_data<T: AsRef<[u8]>>(items: &[T]) -> Result<Self, MerkleError> {
        Self::from_leaves(items.iter().map(|i| sha256(i.as_ref())).collect())
    }

    pub fn root(&self) -> Buf32 {
        // Construction guarantees a final single-node layer.
        self.layers[self.layers.len() - 1][0]
    }

    pub fn leaf_count(&self) -> usize {
        self.layers[0].len()
    }

    /// Generates an inclusion proof for the leaf at `index`.
    pub fn gen_proof(&self, index: usize) -> Result<MerkleProof, MerkleError> {
        if index >= self.leaf_count() {
            return Err(MerkleError::IndexOutOfBounds {
                index,
                leaves: self.leaf_count(),
            });
        }

        let mut siblings = Vec::with_capacity(self.layers.len() - 1);
        let mut pos = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_pos = pos ^ 1;
            // Trailing node of an odd layer is its own sibling.
            let sibling = layer.get(sibling_pos).unwrap_or(&layer[pos]);
            siblings.push(*sibling);
            pos /= 2;
        }

        Ok(MerkleProof {
            index: index as u64,
            siblings,
        })
    }
}

/// Inclusion proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    index: u64,
    siblings: Vec<Buf32>,
}

impl MerkleProof {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn siblings(&self) -> &[Buf32] {
        &self.siblings
    }

    /// Checks the proof against an expected root for the given leaf.
    pub fn verify(&self, root: &Buf32, leaf: &Buf32) -> bool {
        let mut acc = *leaf;
        let mut pos = self.index;
        for sibling in &self.siblings {
            acc = if pos & 1 == 1 {
                hash_pair(sibling, &acc)
            } else {
                hash_pair(&acc, sibling)
            };
            pos /= 2;
        }
        acc == *root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaves(n: usize) -> Vec<Buf32> {
        (0..n).map(|i| sha256(&[i as u8])).collect()
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert_eq!(
            MerkleTree::from_leaves(Vec::new()).unwrap_err(),
            MerkleError::EmptyTree
        );
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let ls = leaves(1);
        let tree = MerkleTree::from_leaves(ls.clone()).unwrap();
        assert_eq!(tree.root(), ls[0]);
    }

    #[test]
    fn test_two_leaf_root() {
        let ls = leaves(2);
        let tree = MerkleTree::from_leaves(ls.clone()).unwrap();
        assert_eq!(tree.root(), hash_pair(&ls[0], &ls[1]));
    }

    #[test]
    fn test_odd_layer_duplicates_trailing_node() {
        let ls = leaves(3);
        let tree = MerkleTree::from_leaves(ls.clone()).unwrap();
        let left = hash_pair(&ls[0], &ls[1]);
        let right = hash_pair(&ls[2], &ls[2]);
        assert_eq!(tree.root(), hash_pair(&left, &right));
    }

    #[test]
    fn test_proofs_verify_for_every_leaf() {
        for n in [1usize, 2, 3, 5, 8, 13] {
            let ls = leaves(n);
            let tree = MerkleTree::from_leaves(ls.clone()).unwrap();
            let root = tree.root();
            for (i, leaf) in ls.iter().enumerate() {
                let proof = tree.gen_proof(i).unwrap();
                assert!(proof.verify(&root, leaf), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_proof_rejects_tampered_leaf() {
        let ls = leaves(5);
        let tree = MerkleTree::from_leaves(ls).unwrap();
        let proof = tree.gen_proof(2).unwrap();
        assert!(!proof.verify(&tree.root(), &sha256(b"bogus")));
    }

    #[test]
    fn test_proof_index_out_of_bounds() {
        let tree = MerkleTree::from_leaves(leaves(4)).unwrap();
        assert_eq!(
            tree.gen_proof(4).unwrap_err(),
            MerkleError::IndexOutOfBounds { index: 4, leaves: 4 }
        );
    }

    #[test]
    fn test_from_data_hashes_leaves() {
        let items = [b"a".to_vec(), b"b".to_vec()];
        let tree = MerkleTree::from_data(&items).unwrap();
        let expected = hash_pair(&sha256(b"a"), &sha256(b"b"));
        assert_eq!(tree.root(), expected);
    }
}
