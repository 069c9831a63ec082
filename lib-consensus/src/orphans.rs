//! Orphan pool
//!
//! Staging area for blocks whose parent has not been accepted yet. The pool
//! never succeeds: every staging call reports either `UnknownOrphan` (first
//! sighting, caller should fetch the parent from the network) or
//! `KnownOrphan` (duplicate, nothing to do). Promotion is caller-driven: once
//! the parent lands, [`OrphanPool::take_children`] hands back the staged
//! blocks for replay.

use std::collections::HashMap;

use lib_types::BlockHash;

use crate::block::Block;
use crate::error::ConsensusError;

/// Orphaned blocks indexed by the parent id they are waiting for.
#[derive(Debug, Clone, Default)]
pub struct OrphanPool {
    missing_parents: HashMap<BlockHash, HashMap<BlockHash, Block>>,
}

impl OrphanPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an orphan block.
    ///
    /// Precondition: the block's parent is not in the block tree. Always
    /// returns an error value describing what the caller should do next.
    pub fn stage(&mut self, block: Block) -> ConsensusError {
        let waiting = self.missing_parents.entry(block.parent_id).or_default();
        let id = block.id();
        if waiting.contains_key(&id) {
            return ConsensusError::KnownOrphan;
        }
        waiting.insert(id, block);
        ConsensusError::UnknownOrphan
    }

    /// Remove and return every orphan waiting on `parent_id`, for replay.
    pub fn take_children(&mut self, parent_id: &BlockHash) -> Vec<Block> {
        self.missing_parents
            .remove(parent_id)
            .map(|waiting| waiting.into_values().collect())
            .unwrap_or_default()
    }

    /// Whether the exact block is currently staged
    pub fn contains(&self, block: &Block) -> bool {
        self.missing_parents
            .get(&block.parent_id)
            .is_some_and(|waiting| waiting.contains_key(&block.id()))
    }

    /// Total number of staged orphans
    pub fn len(&self) -> usize {
        self.missing_parents.values().map(HashMap::len).sum()
    }

    /// Whether the pool is empty
    pub fn is_empty(&self) -> bool {
        self.missing_parents.is_empty()
    }
}
