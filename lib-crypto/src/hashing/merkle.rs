//! Domain-separated binary Merkle tree
//!
//! Commits to an ordered set of 32-byte leaves. Leaf and internal hashes use
//! distinct domain tags so an internal node can never be reinterpreted as a
//! leaf (second-preimage hardening).
//!
//! Shape rules:
//! - An empty set commits to the zero hash.
//! - A level with an odd node count promotes the trailing node unchanged
//!   (no duplication).

/// Domain tag prepended when hashing a leaf.
const LEAF_TAG: u8 = 0x00;

/// Domain tag prepended when hashing an internal node.
const NODE_TAG: u8 = 0x01;

/// Hash a leaf value into the tree's leaf domain.
pub fn leaf_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[LEAF_TAG]);
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash two child commitments into their parent.
pub fn node_hash(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&[NODE_TAG]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Compute the Merkle root over pre-hashed leaves.
///
/// Callers produce leaves with [`leaf_hash`]; this function folds levels
/// pairwise until a single root remains.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut level: Vec<[u8; 32]> = leaves.to_vec();
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => next.push(node_hash(left, right)),
                [odd] => next.push(*odd),
                _ => unreachable!(),
            }
        }
        level = next;
    }
    level[0]
}
