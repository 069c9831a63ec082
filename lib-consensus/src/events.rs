//! Consensus change notifications
//!
//! Subscribers receive one [`ConsensusChange`] per successful block
//! acceptance, in commit order. A change is only ever published for committed
//! state: failed acceptances and rolled-back reorganizations publish nothing.

use serde::{Deserialize, Serialize};
use lib_utxo::BlockDiff;

/// The ledger effect of one committed `accept_block` call.
///
/// Empty for accepts that did not move the canonical chain; populated with
/// the rewound and replayed block diffs when a reorganization committed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusChange {
    /// Diffs of blocks removed from the canonical chain, in rewind order
    /// (old tip first)
    pub inverted_blocks: Vec<BlockDiff>,
    /// Diffs of blocks added to the canonical chain, in application order
    /// (new tip last)
    pub applied_blocks: Vec<BlockDiff>,
}

impl ConsensusChange {
    /// Whether the change carries no ledger effect
    pub fn is_empty(&self) -> bool {
        self.inverted_blocks.is_empty() && self.applied_blocks.is_empty()
    }
}
