//! Block structure
//!
//! A block is a header plus an ordered transaction list. The header commits
//! to the parent, the production time, the miner payout address, and a Merkle
//! root over the transactions; the block's identity is the BLAKE3 hash of
//! those header fields. Proof of work is the statement `id ≤ parent.target`.

use serde::{Deserialize, Serialize};

use lib_crypto::hash_blake3_multiple;
use lib_types::{Address, BlockHash, OutputId, Timestamp};
use lib_utxo::{transaction_merkle_root, Transaction};

/// Domain tag for deriving the miner subsidy output id from a block id.
const SUBSIDY_TAG: &[u8] = b"subsidy";

/// A Meridian block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Id of the parent block (zero hash for genesis)
    pub parent_id: BlockHash,
    /// UNIX timestamp of block production, in seconds
    pub timestamp: Timestamp,
    /// Mining nonce found via proof-of-work
    pub nonce: u64,
    /// Address credited with the block subsidy
    pub miner_address: Address,
    /// Merkle root committing to the complete, ordered transaction list
    pub merkle_root: [u8; 32],
    /// Transactions included in the block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Canonical block identity: field-by-field BLAKE3 over the header.
    ///
    /// Every header field participates; the transactions are covered through
    /// the Merkle root. Changing any field changes the id.
    pub fn id(&self) -> BlockHash {
        BlockHash::new(hash_blake3_multiple(&[
            self.parent_id.as_bytes(),
            &self.timestamp.to_le_bytes(),
            &self.nonce.to_le_bytes(),
            self.miner_address.as_bytes(),
            &self.merkle_root,
        ]))
    }

    /// Deterministic id of this block's miner subsidy output.
    pub fn subsidy_id(&self) -> OutputId {
        OutputId::new(hash_blake3_multiple(&[self.id().as_bytes(), SUBSIDY_TAG]))
    }

    /// Recompute the Merkle root over the carried transactions.
    pub fn transaction_merkle_root(&self) -> [u8; 32] {
        transaction_merkle_root(&self.transactions)
    }

    /// Canonical encoded length in bytes, used for the protocol size limit.
    ///
    /// A block that fails to encode reports `usize::MAX` so it can never
    /// slip under the limit.
    pub fn encoded_len(&self) -> usize {
        bincode::serialized_size(self)
            .map(|size| size as usize)
            .unwrap_or(usize::MAX)
    }

    /// Check if this is a genesis block
    pub fn is_genesis(&self) -> bool {
        self.parent_id.is_zero()
    }
}
