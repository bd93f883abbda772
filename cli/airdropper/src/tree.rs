use crate::common::{keccak256_hash, Hash};
use crate::error::AirdropError;

/// A Merkle tree kept as its full level history.
///
/// `levels[0]` holds the leaves and the last level holds only the root. A
/// level of odd length pairs its last node with itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    levels: Vec<Vec<Hash>>,
}

impl MerkleTree {
    /// Builds every level from the ordered leaves.
    ///
    /// # Errors
    /// Returns [`AirdropError::EmptyDataset`] when `leaves` is empty.
    pub fn new(leaves: Vec<Hash>) -> Result<Self, AirdropError> {
        if leaves.is_empty() {
            return Err(AirdropError::EmptyDataset);
        }

        let mut levels = vec![leaves];
        while let Some(level) = levels.last().filter(|level| level.len() > 1) {
            let next_level = reduce_level(level);
            levels.push(next_level);
        }

        Ok(Self { levels })
    }

    pub fn root(&self) -> Hash {
        // `new` guarantees at least one level whose last entry is the root.
        self.levels[self.levels.len() - 1][0]
    }

    pub fn leaves(&self) -> &[Hash] {
        &self.levels[0]
    }

    pub fn leaf_count(&self) -> usize {
        self.levels[0].len()
    }

    /// Number of levels above the leaves; equals the proof length.
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn levels(&self) -> &[Vec<Hash>] {
        &self.levels
    }
}

/// Reduces one level by hashing adjacent pairs.
fn reduce_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|chunk| {
            let left = chunk[0];
            let right = if chunk.len() == 2 { chunk[1] } else { left };
            keccak256_hash(left, right)
        })
        .collect()
}

/// Computes the root of the ordered leaves without keeping the levels.
///
/// # Errors
/// Returns [`AirdropError::EmptyDataset`] when `leaves` is empty.
pub fn build_root(leaves: &[Hash]) -> Result<Hash, AirdropError> {
    if leaves.is_empty() {
        return Err(AirdropError::EmptyDataset);
    }
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = reduce_level(&level);
    }
    Ok(level[0])
}
