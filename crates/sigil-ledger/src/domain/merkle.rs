//! # Merkle Engine
//!
//! Binary Merkle tree over 32-byte leaves.
//!
//! ## Rules
//!
//! - Empty tree: root is [`Hash::ZERO`].
//! - One leaf: the leaf is the root.
//! - Interior node: `SHA256(0x01 || left || right)`.
//! - An unpaired last node at any level is carried up unchanged, never
//!   paired with itself.
//!
//! Sibling positions are not stored in the proof: they follow from the
//! leaf index and leaf count, which the verifier walks level by level.
//! A proof with a path of the wrong length for its shape never verifies.

use super::errors::LedgerError;
use serde::{Deserialize, Serialize};
use sigil_crypto::digest_many;
use sigil_types::Hash;

/// Domain tag prefixed to interior node preimages.
pub const NODE_TAG: u8 = 0x01;

/// Inclusion proof for one leaf.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// The leaf being proven.
    pub leaf: Hash,
    /// Position of the leaf.
    pub index: u64,
    /// Number of leaves in the tree.
    pub leaf_count: u64,
    /// Sibling hashes from the bottom level up.
    pub siblings: Vec<Hash>,
}

/// Hash an interior node.
pub fn hash_node(left: &Hash, right: &Hash) -> Hash {
    digest_many(&[&[NODE_TAG], left.as_bytes(), right.as_bytes()])
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => hash_node(left, right),
            [single] => *single,
            _ => unreachable!("chunks(2) yields one or two items"),
        })
        .collect()
}

/// Compute the root of `leaves`.
pub fn build_root(leaves: &[Hash]) -> Hash {
    match leaves {
        [] => Hash::ZERO,
        [only] => *only,
        _ => {
            let mut level = next_level(leaves);
            while level.len() > 1 {
                level = next_level(&level);
            }
            level[0]
        }
    }
}

/// Build an inclusion proof for the leaf at `index`.
pub fn prove(leaves: &[Hash], index: usize) -> Result<MerkleProof, LedgerError> {
    if index >= leaves.len() {
        return Err(LedgerError::ProofIndexOutOfRange {
            index: index as u64,
            len: leaves.len() as u64,
        });
    }

    let mut siblings = Vec::new();
    let mut level = leaves.to_vec();
    let mut position = index;

    while level.len() > 1 {
        let carried = position == level.len() - 1 && level.len() % 2 == 1;
        if !carried {
            siblings.push(level[position ^ 1]);
        }
        level = next_level(&level);
        position /= 2;
    }

    Ok(MerkleProof {
        leaf: leaves[index],
        index: index as u64,
        leaf_count: leaves.len() as u64,
        siblings,
    })
}

/// Fold a proof up to the root it implies.
///
/// Returns `None` when the proof is malformed for its declared shape.
pub fn compute_root(proof: &MerkleProof) -> Option<Hash> {
    if proof.leaf_count == 0 || proof.index >= proof.leaf_count {
        return None;
    }

    let mut current = proof.leaf;
    let mut position = proof.index;
    let mut width = proof.leaf_count;
    let mut siblings = proof.siblings.iter();

    while width > 1 {
        let carried = position == width - 1 && width % 2 == 1;
        if !carried {
            let sibling = siblings.next()?;
            current = if position % 2 == 0 {
                hash_node(&current, sibling)
            } else {
                hash_node(sibling, &current)
            };
        }
        position /= 2;
        width = width / 2 + width % 2;
    }

    if siblings.next().is_some() {
        return None;
    }
    Some(current)
}

/// Check a proof against `root`. Never panics; malformed proofs are `false`.
pub fn verify(root: &Hash, proof: &MerkleProof) -> bool {
    compute_root(proof).is_some_and(|computed| computed == *root)
}

/// Like [`verify`], with a reason on failure.
pub fn check(root: &Hash, proof: &MerkleProof) -> Result<(), LedgerError> {
    match compute_root(proof) {
        None => Err(LedgerError::MalformedProof(format!(
            "path of {} siblings does not fit index {} of {} leaves",
            proof.siblings.len(),
            proof.index,
            proof.leaf_count
        ))),
        Some(computed) if computed != *root => Err(LedgerError::MalformedProof(format!(
            "proof folds to {} but root is {}",
            computed.short(),
            root.short()
        ))),
        Some(_) => Ok(()),
    }
}
