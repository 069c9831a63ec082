//! Meridian Cryptography Foundation Module
//!
//! Canonical hashing for consensus-critical data.

pub mod hashing;

// Re-export hashing functionality
pub use hashing::{canonical_consensus_hash, hash_blake3_multiple};
pub use hashing::merkle::{leaf_hash, merkle_root, node_hash};
