//! Block integration against the ledger
//!
//! `integrate_block` and `invert_recent_block` are exact inverses: applying a
//! block and then inverting it leaves the UTXO set and executor state
//! byte-identical. The reorg controller leans on this to guarantee rollback.

use tracing::debug;

use lib_types::{BlockHash, Currency};
use lib_utxo::{BlockDiff, Output, OutputDiff, UtxoError};

use crate::error::ConsensusResult;
use crate::state::State;

impl State {
    /// Apply the block with `block_id` on top of the current tip.
    ///
    /// Each transaction is validated against the live ledger and applied in
    /// order; a validation failure unwinds the already-applied prefix and
    /// surfaces the transaction error with the ledger untouched. A successful
    /// integration finishes with contract maintenance, the miner subsidy
    /// (collected fees plus coinbase), and the canonical-path update.
    pub(crate) fn integrate_block(
        &mut self,
        block_id: BlockHash,
    ) -> ConsensusResult<(Vec<OutputDiff>, BlockDiff)> {
        let (block, height) = {
            let node = self.node(&block_id);
            (node.block.clone(), node.height)
        };

        let mut block_diff = BlockDiff {
            catalyst: block_id,
            ..BlockDiff::default()
        };
        let mut diffs: Vec<OutputDiff> = Vec::new();
        let mut miner_subsidy: Currency = 0;

        for (applied, txn) in block.transactions.iter().enumerate() {
            let validation = self
                .executor
                .validate_transaction(&self.ledger, txn)
                .and_then(|()| txn.total_fees().ok_or(UtxoError::Overflow));
            let fees = match validation {
                Ok(fees) => fees,
                Err(err) => {
                    // Unwind the applied prefix in reverse; the ledger must
                    // read as though this block was never seen.
                    for done in block.transactions[..applied].iter().rev() {
                        self.executor.invert_transaction(&mut self.ledger, done);
                    }
                    debug!("Block {} rejected by transaction {}: {}", block_id, applied, err);
                    return Err(err.into());
                }
            };

            let txn_diff = self.executor.apply_transaction(&mut self.ledger, txn);
            diffs.extend(txn_diff.output_diffs.iter().cloned());
            block_diff.transaction_diffs.push(txn_diff);
            miner_subsidy = miner_subsidy.saturating_add(fees);
        }

        // Per-block contract lifecycle step; the hook records its own
        // mutations in the block-level diff.
        let maintenance = self.executor.apply_contract_maintenance(
            &mut self.ledger,
            height,
            &mut block_diff.block_changes,
        );
        diffs.extend(maintenance);

        // Miner subsidy: collected fees plus the emission schedule.
        miner_subsidy = miner_subsidy.saturating_add(self.executor.calculate_coinbase(height));
        let subsidy_id = block.subsidy_id();
        let subsidy = Output::new(miner_subsidy, block.miner_address);
        self.ledger.insert(subsidy_id, subsidy);
        let subsidy_diff = OutputDiff {
            new: true,
            id: subsidy_id,
            output: subsidy,
        };
        diffs.push(subsidy_diff.clone());
        block_diff.block_changes.output_diffs.push(subsidy_diff);

        // The block is now the canonical tip.
        self.current_block_id = block_id;
        self.current_path.insert(height, block_id);

        Ok((diffs, block_diff))
    }

    /// Remove the canonical tip from the ledger, restoring the state that
    /// preceded its integration. Exact mirror of `integrate_block`, executed
    /// in reverse order.
    pub(crate) fn invert_recent_block(&mut self) -> Vec<OutputDiff> {
        let (block, height) = {
            let node = self.canonical_tip_node();
            (node.block.clone(), node.height)
        };

        let mut diffs: Vec<OutputDiff> = Vec::new();

        // Delete the miner subsidy.
        let subsidy_id = block.subsidy_id();
        let subsidy = self
            .ledger
            .remove(&subsidy_id)
            .expect("canonical tip is missing its subsidy output");
        diffs.push(OutputDiff {
            new: false,
            id: subsidy_id,
            output: subsidy,
        });

        // Undo contract maintenance.
        diffs.extend(self.executor.invert_contract_maintenance(&mut self.ledger));

        // Undo transactions in reverse application order.
        for txn in block.transactions.iter().rev() {
            diffs.extend(self.executor.invert_transaction(&mut self.ledger, txn));
        }

        self.current_path.remove(&height);
        self.current_block_id = block.parent_id;

        diffs
    }
}
