//! Consensus Errors
//!
//! Error identities are part of the peer protocol: callers use them to decide
//! whether to relay a block, fetch a missing parent, or drop a peer. Keep the
//! variants stable.

use thiserror::Error;
use lib_types::Timestamp;
use lib_utxo::UtxoError;

/// Error from block acceptance
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// The block is already in the block tree. State unchanged.
    #[error("block exists in block map")]
    BlockKnown,

    /// The block id is recorded as invalid. State unchanged.
    #[error("block is known to be invalid")]
    InvalidBlockKnown,

    /// The block's parent is unknown and the block was staged for the first
    /// time. The caller should request the parent from the network.
    #[error("block is an unknown orphan")]
    UnknownOrphan,

    /// The block's parent is unknown and the block was already staged.
    #[error("block is a known orphan")]
    KnownOrphan,

    /// The block's timestamp is too far ahead of the local clock. Not
    /// recorded as invalid; a deferred retry is scheduled for when the skew
    /// has decayed.
    #[error("block timestamp too far in the future, will retry in {retry_after}s")]
    FutureBlock {
        /// Seconds until the block's skew falls back inside the threshold
        retry_after: Timestamp,
    },

    /// The block id does not meet its parent's target.
    #[error("block id does not meet the parent target")]
    WorkBelowTarget,

    /// The block's timestamp is earlier than the median timestamp of its
    /// recent ancestors. Recorded as invalid.
    #[error("block timestamp is earlier than the median of its ancestors")]
    TimestampTooEarly,

    /// The declared Merkle root does not commit to the block's transactions.
    /// Recorded as invalid.
    #[error("merkle root does not match the block transactions")]
    MerkleMismatch,

    /// The encoded block exceeds the protocol size limit. Not recorded as
    /// invalid: a peer may have padded the encoding and could retransmit
    /// correctly.
    #[error("block size {size} exceeds limit {limit}")]
    BlockTooLarge { size: usize, limit: usize },

    /// A transaction failed validation during block integration, surfaced
    /// verbatim from the transaction layer.
    #[error(transparent)]
    Transaction(#[from] UtxoError),
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
