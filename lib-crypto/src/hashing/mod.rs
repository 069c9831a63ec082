//! Hashing module for Meridian cryptography
//!
//! Provides the BLAKE3 hashing functionality used throughout the system.
//!
//! # Canonical Consensus Hash
//!
//! **BLAKE3 is the canonical hash function for all consensus-critical data.**
//!
//! This includes block identifiers, transaction hashes, Merkle commitments,
//! and state digests. Using an alternate hash for consensus-critical objects
//! causes mismatched commitments between nodes and splits the network.
//!
//! See [`CONSENSUS_HASH_FUNCTION`] and [`canonical_consensus_hash`].

pub mod merkle;

pub use merkle::merkle_root;

// ============================================================================
// CANONICAL CONSENSUS HASH
// ============================================================================

/// The canonical hash function for all consensus-critical data.
///
/// All block identifiers, transaction hashes, and state digests MUST be
/// hashed with BLAKE3.
pub const CONSENSUS_HASH_FUNCTION: &str = "BLAKE3";

/// Computes the canonical consensus hash of `data` using BLAKE3.
///
/// Use this for any data that enters a consensus-critical path.
pub fn canonical_consensus_hash(data: &[u8]) -> [u8; 32] {
    blake3::hash(data).into()
}

/// Hash multiple data segments as one message
pub fn hash_blake3_multiple(data_segments: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for segment in data_segments {
        hasher.update(segment);
    }
    hasher.finalize().into()
}
