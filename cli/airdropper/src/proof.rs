//! Inclusion proofs against a [`MerkleTree`].
//!
//! A proof lists one sibling per level from the leaves upward. When verifying,
//! the low bit of the running index decides the operand order: odd means the
//! sibling is hashed on the left, even means on the right. The on-chain
//! verifier walks the path the same way.

use crate::common::{keccak256_hash, Address, Hash};
use crate::error::AirdropError;
use crate::leaf::encode_leaf;
use crate::tree::MerkleTree;

/// Collects the sibling path of the leaf at `index`.
///
/// A node without a right neighbour (last node of an odd level) is its own
/// sibling, matching the pairing rule used when the tree was reduced.
///
/// # Errors
/// Returns [`AirdropError::IndexOutOfRange`] if `index >= tree.leaf_count()`.
pub fn generate_proof(tree: &MerkleTree, index: usize) -> Result<Vec<Hash>, AirdropError> {
    let len = tree.leaf_count();
    if index >= len {
        return Err(AirdropError::IndexOutOfRange { index, len });
    }

    let mut proof = Vec::with_capacity(tree.depth());
    let mut current_index = index;

    // The root level has no sibling.
    for level in &tree.levels()[..tree.depth()] {
        let sibling = if current_index % 2 == 1 {
            level[current_index - 1]
        } else {
            level
                .get(current_index + 1)
                .copied()
                .unwrap_or(level[current_index])
        };
        proof.push(sibling);
        current_index /= 2;
    }

    Ok(proof)
}

/// Builds the tree over `leaves` and returns the proof for `index`.
///
/// Prefer [`generate_proof`] with a retained tree when producing many proofs.
///
/// # Errors
/// Returns [`AirdropError::IndexOutOfRange`] if `index >= leaves.len()`.
pub fn generate_proof_from_leaves(
    leaves: &[Hash],
    index: usize,
) -> Result<Vec<Hash>, AirdropError> {
    if index >= leaves.len() {
        return Err(AirdropError::IndexOutOfRange {
            index,
            len: leaves.len(),
        });
    }
    let tree = MerkleTree::new(leaves.to_vec())?;
    generate_proof(&tree, index)
}

/// Folds `proof` onto `leaf` and returns the resulting root.
pub fn compute_root(leaf: Hash, index: u64, proof: &[Hash]) -> Hash {
    let mut node = leaf;
    let mut path = index;
    for sibling in proof {
        node = if path & 1 == 1 {
            keccak256_hash(*sibling, node)
        } else {
            keccak256_hash(node, *sibling)
        };
        path >>= 1;
    }
    node
}

/// Checks that `(index, address, balance)` is included under `root`.
///
/// A mismatch is a plain `false`, never an error.
pub fn verify_proof(
    root: &Hash,
    index: u64,
    address: &Address,
    balance: u128,
    proof: &[Hash],
) -> bool {
    let leaf = encode_leaf(index, address, balance);
    compute_root(leaf, index, proof) == *root
}
