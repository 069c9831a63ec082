//! Reorganization controller
//!
//! Switches the canonical chain to a heavier branch by rewinding the current
//! suffix and replaying the new one. The switch is all-or-nothing: if any
//! replayed block fails validation, its whole subtree is invalidated, the
//! replayed prefix is unwound, the rewound blocks are re-integrated, and the
//! caller observes state identical to the pre-attempt snapshot.

use tracing::{info, warn};

use lib_types::BlockHash;
use lib_utxo::OutputDiff;

use crate::block::Block;
use crate::error::ConsensusResult;
use crate::events::ConsensusChange;
use crate::state::State;

/// Everything a committed reorganization produced.
#[derive(Debug, Clone, Default)]
pub(crate) struct ForkOutcome {
    /// Blocks removed from the canonical chain, old tip first
    pub rewound: Vec<Block>,
    /// Blocks added to the canonical chain, new tip last
    pub applied: Vec<Block>,
    /// Every ledger mutation, in execution order (rewind before replay)
    pub diffs: Vec<OutputDiff>,
    /// The subscriber-facing change record
    pub change: ConsensusChange,
}

impl State {
    /// Make `new_tip` the canonical tip.
    ///
    /// Precondition: `new_tip` is in the block tree and heavier than the
    /// current tip. On error the tree has lost the invalid subtree, the
    /// committed state is bit-identical to before the call, and nothing is
    /// reported to subscribers.
    pub(crate) fn fork_blockchain(&mut self, new_tip: BlockHash) -> ConsensusResult<ForkOutcome> {
        // Walk up from the new tip until we meet the canonical chain,
        // recording the branch so it can be replayed top-down.
        let mut branch: Vec<BlockHash> = Vec::new();
        let mut cursor = new_tip;
        loop {
            let node = self.node(&cursor);
            if self.current_path.get(&node.height) == Some(&cursor) {
                break;
            }
            branch.push(cursor);
            cursor = node.block.parent_id;
        }
        let common_ancestor = cursor;

        #[cfg(debug_assertions)]
        let pre_hash = self.state_hash();

        // Rewind to the common ancestor, collecting the cached diffs of the
        // outgoing blocks for subscribers.
        let mut outcome = ForkOutcome::default();
        while self.current_block_id != common_ancestor {
            let tip = self.canonical_tip_node();
            outcome.rewound.push(tip.block.clone());
            let cached = tip
                .diff
                .clone()
                .expect("canonical block above the ancestor has no cached diff");
            outcome.change.inverted_blocks.push(cached);
            let inverted = self.invert_recent_block();
            outcome.diffs.extend(inverted);
        }

        // Replay the branch from the ancestor's child down to the new tip.
        let mut replayed = 0usize;
        for index in (0..branch.len()).rev() {
            let block_id = branch[index];
            match self.integrate_block(block_id) {
                Ok((diffs, block_diff)) => {
                    outcome.applied.push(self.node(&block_id).block.clone());
                    if let Some(node) = self.block_map.get_mut(&block_id) {
                        node.diff = Some(block_diff.clone());
                    }
                    outcome.change.applied_blocks.push(block_diff);
                    outcome.diffs.extend(diffs);
                    replayed += 1;
                }
                Err(err) => {
                    warn!(
                        "Reorganization aborted: block {} failed integration ({}); rolling back",
                        block_id, err
                    );

                    // The offending block and everything under it can never
                    // validate on this ledger.
                    self.invalidate_subtree(block_id);

                    // Unwind the replayed prefix.
                    for _ in 0..replayed {
                        self.invert_recent_block();
                    }

                    // Re-integrate the original chain, newest rewind last.
                    // The cached diffs on these nodes stay valid because the
                    // ledger is restored to exactly the state they recorded.
                    for block in outcome.rewound.iter().rev() {
                        if let Err(reapply_err) = self.integrate_block(block.id()) {
                            panic!(
                                "previously valid block {} failed to re-integrate during rollback: {}",
                                block.id(),
                                reapply_err
                            );
                        }
                    }

                    #[cfg(debug_assertions)]
                    assert_eq!(
                        self.state_hash(),
                        pre_hash,
                        "state hash does not match after an unsuccessful fork attempt"
                    );

                    return Err(err);
                }
            }
        }

        // Transactions stranded by the switch (spent inputs, replaced
        // proofs) are the pool's problem now.
        self.executor.clean_transaction_pool();

        if !outcome.rewound.is_empty() {
            info!(
                "🔄 Reorganized: {} blocks rewound, {} applied, tip {} at height {}",
                outcome.rewound.len(),
                outcome.applied.len(),
                self.current_block_id,
                self.height()
            );
        }

        Ok(outcome)
    }

    /// Remove a subtree from the block map and record every id in the
    /// bad-block set. Post-order so children are gone before their parent.
    pub(crate) fn invalidate_subtree(&mut self, root: BlockHash) {
        let children = match self.block_map.get(&root) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.invalidate_subtree(child);
        }
        self.block_map.remove(&root);
        self.bad_blocks.insert(root);
    }
}
