//! Merkle tree over ordered records, with inclusion proofs.
//!
//! Leaves are the digests of each record's canonical encoding. Each level is
//! reduced pairwise (`H(left || right)`), and an odd trailing node is paired
//! with a copy of itself.

use crate::hash::{Hash, HashAlgorithm};
use crate::record::record_digest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while building trees or proofs.
#[derive(Debug, Error)]
pub enum MerkleError {
    #[error("cannot build a merkle tree from zero records")]
    EmptyInput,

    #[error("no leaf at index {index} (tree has {leaf_count} leaves)")]
    InvalidProofIndex { index: usize, leaf_count: usize },

    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MerkleError>;

/// Side on which a sibling is concatenated when folding a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `H(sibling || current)`
    Left,
    /// `H(current || sibling)`
    Right,
}

/// One step of an inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofStep {
    pub sibling: Hash,
    pub direction: Direction,
}

/// A merkle proof for a single leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Position of the proven leaf.
    pub index: usize,
    /// Sibling hashes from leaf to root.
    pub steps: Vec<ProofStep>,
}

impl MerkleProof {
    /// Fold a leaf digest through the proof steps.
    pub fn fold(&self, leaf: Hash, algorithm: HashAlgorithm) -> Hash {
        self.steps.iter().fold(leaf, |current, step| match step.direction {
            Direction::Left => algorithm.digest_concat(&[step.sibling.as_ref(), current.as_ref()]),
            Direction::Right => algorithm.digest_concat(&[current.as_ref(), step.sibling.as_ref()]),
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A merkle tree for efficient proofs.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    algorithm: HashAlgorithm,
    /// All nodes in the tree, level by level (leaves first). Padding copies
    /// are not stored.
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Build a merkle tree from a list of leaf hashes.
    pub fn from_leaves(leaves: Vec<Hash>, algorithm: HashAlgorithm) -> Result<Self> {
        if leaves.is_empty() {
            return Err(MerkleError::EmptyInput);
        }

        let mut levels = vec![leaves];

        while let Some(current) = levels.last().filter(|level| level.len() > 1) {
            let mut next = Vec::with_capacity(current.len().div_ceil(2));

            for chunk in current.chunks(2) {
                let left = &chunk[0];
                // Odd number of elements: hash the last one with itself
                let right = chunk.get(1).unwrap_or(left);
                next.push(algorithm.digest_concat(&[left.as_ref(), right.as_ref()]));
            }

            levels.push(next);
        }

        Ok(Self { algorithm, levels })
    }

    /// Build a merkle tree over the canonical encoding of each record.
    pub fn from_records<T: Serialize>(records: &[T], algorithm: HashAlgorithm) -> Result<Self> {
        let leaves = records
            .iter()
            .map(|record| record_digest(record, algorithm))
            .collect::<serde_json::Result<Vec<_>>>()?;
        Self::from_leaves(leaves, algorithm)
    }

    /// Get the root of the merkle tree.
    pub fn root(&self) -> Hash {
        // Construction guarantees a final level holding exactly one node.
        self.levels[self.levels.len() - 1][0]
    }

    /// Get the number of leaves in the tree.
    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of hashing levels above the leaves (the proof length).
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Generate a proof for the leaf at the given index.
    ///
    /// Only real leaves can be proven; the padding copy of an odd trailing
    /// leaf has no index of its own.
    pub fn proof(&self, index: usize) -> Result<MerkleProof> {
        if index >= self.leaf_count() {
            return Err(MerkleError::InvalidProofIndex {
                index,
                leaf_count: self.leaf_count(),
            });
        }

        let mut steps = Vec::with_capacity(self.depth());
        let mut idx = index;

        for level in &self.levels[..self.levels.len() - 1] {
            let is_left = idx % 2 == 0;
            let (sibling_idx, direction) = if is_left {
                (idx + 1, Direction::Right)
            } else {
                (idx - 1, Direction::Left)
            };

            let sibling = level.get(sibling_idx).copied().unwrap_or(level[idx]);
            steps.push(ProofStep { sibling, direction });
            idx /= 2;
        }

        Ok(MerkleProof { index, steps })
    }

    /// Verify a record's proof against this tree's root.
    pub fn verify<T: Serialize>(&self, record: &T, proof: &MerkleProof) -> bool {
        verify_proof(record, proof, &self.root(), self.algorithm)
    }
}

/// Compute the merkle root of a list of records.
pub fn build_root<T: Serialize>(records: &[T], algorithm: HashAlgorithm) -> Result<Hash> {
    Ok(MerkleTree::from_records(records, algorithm)?.root())
}

/// Build the inclusion proof for `records[index]`.
pub fn build_proof<T: Serialize>(
    records: &[T],
    index: usize,
    algorithm: HashAlgorithm,
) -> Result<MerkleProof> {
    MerkleTree::from_records(records, algorithm)?.proof(index)
}

/// Verify that `record` is included under `root`.
///
/// A record that cannot be serialized never verifies.
pub fn verify_proof<T: Serialize>(
    record: &T,
    proof: &MerkleProof,
    root: &Hash,
    algorithm: HashAlgorithm,
) -> bool {
    match record_digest(record, algorithm) {
        Ok(leaf) => verify_leaf(leaf, proof, root, algorithm),
        Err(_) => false,
    }
}

/// Verify a proof starting from an already hashed leaf.
pub fn verify_leaf(leaf: Hash, proof: &MerkleProof, root: &Hash, algorithm: HashAlgorithm) -> bool {
    proof.fold(leaf, algorithm) == *root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash;
    use crate::record::Transfer;

    const ALGO: HashAlgorithm = HashAlgorithm::Sha256;

    fn make_hashes(n: usize) -> Vec<Hash> {
        (0..n).map(|i| hash(&[i as u8])).collect()
    }

    fn transfers() -> Vec<Transfer> {
        vec![
            Transfer::new("Alice", "Bob", 10),
            Transfer::new("Bob", "Charlie", 5),
            Transfer::new("Charlie", "Dave", 2),
        ]
    }

    fn pair(a: &Hash, b: &Hash) -> Hash {
        ALGO.digest_concat(&[a.as_ref(), b.as_ref()])
    }

    #[test]
    fn test_merkle_root_empty() {
        let records: Vec<Transfer> = Vec::new();
        assert!(matches!(build_root(&records, ALGO), Err(MerkleError::EmptyInput)));
        assert!(matches!(
            build_proof(&records, 0, ALGO),
            Err(MerkleError::EmptyInput)
        ));
    }

    #[test]
    fn test_merkle_root_single() {
        let records = vec![Transfer::new("Alice", "Bob", 10)];
        let root = build_root(&records, ALGO).unwrap();
        assert_eq!(root, records[0].hash());

        let proof = build_proof(&records, 0, ALGO).unwrap();
        assert!(proof.is_empty());
        assert!(verify_proof(&records[0], &proof, &root, ALGO));
    }

    #[test]
    fn test_merkle_root_two() {
        let hashes = make_hashes(2);
        let tree = MerkleTree::from_leaves(hashes.clone(), ALGO).unwrap();
        assert_eq!(tree.root(), pair(&hashes[0], &hashes[1]));
    }

    #[test]
    fn test_odd_level_duplicates_last() {
        let hashes = make_hashes(3);
        let tree = MerkleTree::from_leaves(hashes.clone(), ALGO).unwrap();

        let left = pair(&hashes[0], &hashes[1]);
        let right = pair(&hashes[2], &hashes[2]);
        assert_eq!(tree.root(), pair(&left, &right));
        assert_eq!(tree.depth(), 2);
    }

    #[test]
    fn test_merkle_root_deterministic() {
        let records = transfers();
        let r1 = build_root(&records, ALGO).unwrap();
        let r2 = build_root(&records, ALGO).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn test_merkle_root_changes_with_any_record() {
        let records = transfers();
        let root = build_root(&records, ALGO).unwrap();

        for i in 0..records.len() {
            let mut altered = records.clone();
            altered[i].amount = 999;
            assert_ne!(build_root(&altered, ALGO).unwrap(), root);
        }
    }

    #[test]
    fn test_merkle_root_order_matters() {
        let hashes = make_hashes(4);
        let mut reversed = hashes.clone();
        reversed.reverse();

        let r1 = MerkleTree::from_leaves(hashes, ALGO).unwrap().root();
        let r2 = MerkleTree::from_leaves(reversed, ALGO).unwrap().root();
        assert_ne!(r1, r2);
    }

    #[test]
    fn test_merkle_algorithm_matters() {
        let records = transfers();
        let sha2 = build_root(&records, HashAlgorithm::Sha256).unwrap();
        let blake = build_root(&records, HashAlgorithm::Blake3).unwrap();
        assert_ne!(sha2, blake);
    }

    #[test]
    fn test_merkle_proof_valid_for_every_index() {
        for n in 1..=9 {
            let hashes = make_hashes(n);
            let tree = MerkleTree::from_leaves(hashes.clone(), ALGO).unwrap();

            for (i, leaf) in hashes.iter().enumerate() {
                let proof = tree.proof(i).unwrap();
                assert_eq!(proof.len(), tree.depth());
                assert!(verify_leaf(*leaf, &proof, &tree.root(), ALGO), "n={n} i={i}");
            }
        }
    }

    #[test]
    fn test_proof_directions() {
        let records = transfers();
        let tree = MerkleTree::from_records(&records, ALGO).unwrap();
        let leaves = tree.leaves().to_vec();

        let proof = tree.proof(1).unwrap();
        assert_eq!(proof.steps.len(), 2);
        assert_eq!(proof.steps[0].sibling, leaves[0]);
        assert_eq!(proof.steps[0].direction, Direction::Left);
        assert_eq!(proof.steps[1].sibling, pair(&leaves[2], &leaves[2]));
        assert_eq!(proof.steps[1].direction, Direction::Right);

        // The odd trailing leaf is paired with its own copy.
        let proof = tree.proof(2).unwrap();
        assert_eq!(proof.steps[0].sibling, leaves[2]);
        assert_eq!(proof.steps[0].direction, Direction::Right);
    }

    #[test]
    fn test_transfer_scenario() {
        let records = transfers();
        let root = build_root(&records, ALGO).unwrap();
        let proof = build_proof(&records, 1, ALGO).unwrap();

        let bob = Transfer::new("Bob", "Charlie", 5);
        assert!(verify_proof(&bob, &proof, &root, ALGO));

        let tampered = bob.with_amount(999);
        assert!(!verify_proof(&tampered, &proof, &root, ALGO));

        let stranger = Transfer::new("X", "Y", 1);
        assert!(!verify_proof(&stranger, &proof, &root, ALGO));
    }

    #[test]
    fn test_proof_for_wrong_position_fails() {
        let records = transfers();
        let tree = MerkleTree::from_records(&records, ALGO).unwrap();
        let proof = tree.proof(1).unwrap();
        assert!(!tree.verify(&records[0], &proof));
        assert!(tree.verify(&records[1], &proof));
    }

    #[test]
    fn test_merkle_proof_invalid_index() {
        let records = transfers();
        let tree = MerkleTree::from_records(&records, ALGO).unwrap();

        // Index 3 only exists as the padding copy of leaf 2.
        assert!(matches!(
            tree.proof(3),
            Err(MerkleError::InvalidProofIndex { index: 3, leaf_count: 3 })
        ));
        assert!(tree.proof(10).is_err());
    }

    #[test]
    fn test_merkle_proof_wrong_root() {
        let records = transfers();
        let proof = build_proof(&records, 0, ALGO).unwrap();
        let wrong_root = hash(b"wrong");
        assert!(!verify_proof(&records[0], &proof, &wrong_root, ALGO));
    }

    #[test]
    fn test_verify_is_repeatable() {
        let records = transfers();
        let root = build_root(&records, ALGO).unwrap();
        let proof = build_proof(&records, 2, ALGO).unwrap();
        for _ in 0..3 {
            assert!(verify_proof(&records[2], &proof, &root, ALGO));
        }
    }
}
