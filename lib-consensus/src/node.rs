//! Block tree nodes
//!
//! The tree stores every known-valid block in an arena keyed by id. Nodes
//! name their parent and children by id only; there are no strong mutual
//! references to cycle-break.

use serde::{Deserialize, Serialize};

use lib_types::{BlockHeight, BlockHash, Timestamp};
use lib_utxo::BlockDiff;

use crate::block::Block;
use crate::params::{MEDIAN_TIMESTAMP_WINDOW, ROOT_DEPTH, ROOT_TARGET};
use crate::target::Target;

/// A block plus the chain metadata consensus tracks for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockNode {
    /// The block itself
    pub block: Block,
    /// Height in the tree (genesis = 0)
    pub height: BlockHeight,
    /// Proof-of-work threshold imposed on this node's children
    pub target: Target,
    /// Cumulative chain weight up to and including this node, expressed as
    /// an equivalent aggregate target (smaller is heavier)
    pub depth: Target,
    /// Timestamps of this node and its closest ancestors, oldest first,
    /// clamped by the genesis window
    pub recent_timestamps: [Timestamp; MEDIAN_TIMESTAMP_WINDOW],
    /// Ids of known children
    pub children: Vec<BlockHash>,
    /// Ledger mutations from this node's most recent integration.
    ///
    /// Only meaningful while the node is on the canonical chain; recomputed
    /// whenever the node is re-integrated.
    pub diff: Option<BlockDiff>,
}

impl BlockNode {
    /// Build the genesis node. The timestamp window is seeded with the
    /// genesis timestamp repeated, so early median checks degrade gracefully.
    pub fn genesis(block: Block) -> Self {
        let timestamp = block.timestamp;
        Self {
            block,
            height: 0,
            target: ROOT_TARGET,
            depth: ROOT_DEPTH,
            recent_timestamps: [timestamp; MEDIAN_TIMESTAMP_WINDOW],
            children: Vec::new(),
            diff: None,
        }
    }

    /// The timestamp window a child of this node inherits: shifted left by
    /// one with the child's own timestamp appended.
    pub fn child_window(&self, child_timestamp: Timestamp) -> [Timestamp; MEDIAN_TIMESTAMP_WINDOW] {
        let mut window = [0; MEDIAN_TIMESTAMP_WINDOW];
        window[..MEDIAN_TIMESTAMP_WINDOW - 1]
            .copy_from_slice(&self.recent_timestamps[1..]);
        window[MEDIAN_TIMESTAMP_WINDOW - 1] = child_timestamp;
        window
    }

    /// Earliest timestamp a valid child of this node may carry: the median
    /// of the recent-timestamp window.
    pub fn earliest_child_timestamp(&self) -> Timestamp {
        let mut sorted = self.recent_timestamps;
        sorted.sort_unstable();
        sorted[MEDIAN_TIMESTAMP_WINDOW / 2]
    }
}
