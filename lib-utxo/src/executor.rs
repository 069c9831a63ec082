//! Transaction execution
//!
//! The [`TransactionExecutor`] trait is the seam between consensus and
//! transaction semantics: the engine decides *which* blocks apply, the
//! executor decides *what* a transaction does to the ledger. Implementations
//! must be inverse-ready — every `apply_*` must be exactly undone by the
//! matching `invert_*`, or chain reorganizations corrupt state.
//!
//! [`NativeExecutor`] implements plain value transfers with miner fees.

use std::collections::{HashMap, HashSet};

use lib_types::{BlockHeight, Currency, OutputId};

use crate::errors::{UtxoError, UtxoResult};
use crate::ledger::UtxoLedger;
use crate::types::{Output, OutputDiff, Transaction, TransactionDiff};

/// Base block reward at height 0; decays by one unit per block.
pub const COINBASE_BASE: Currency = 300_000;

/// Block reward floor reached once the decay bottoms out.
pub const COINBASE_FLOOR: Currency = 30_000;

/// Transaction semantics collaborator.
///
/// Calls arrive under the consensus lock and must not block. The engine
/// guarantees `apply_transaction` is only invoked on transactions that passed
/// `validate_transaction` against the same ledger state, and that every
/// invert call mirrors a prior apply on the current canonical tip.
pub trait TransactionExecutor: Send {
    /// Pure validity check against the current ledger. Must not mutate.
    fn validate_transaction(&self, ledger: &UtxoLedger, txn: &Transaction) -> UtxoResult<()>;

    /// Apply a validated transaction, returning the mutations performed.
    fn apply_transaction(&mut self, ledger: &mut UtxoLedger, txn: &Transaction) -> TransactionDiff;

    /// Exactly undo a prior `apply_transaction`, returning the mutations the
    /// inversion performed.
    fn invert_transaction(&mut self, ledger: &mut UtxoLedger, txn: &Transaction) -> Vec<OutputDiff>;

    /// Per-block contract lifecycle step, run after the block's transactions.
    ///
    /// `changes` is the block-level mutation record for the block being
    /// integrated; implementations append every mutation they perform to it
    /// and also return them for the caller's flat diff stream.
    fn apply_contract_maintenance(
        &mut self,
        ledger: &mut UtxoLedger,
        height: BlockHeight,
        changes: &mut TransactionDiff,
    ) -> Vec<OutputDiff>;

    /// Exactly undo the most recent `apply_contract_maintenance`.
    fn invert_contract_maintenance(&mut self, ledger: &mut UtxoLedger) -> Vec<OutputDiff>;

    /// Deterministic block reward for `height`.
    fn calculate_coinbase(&self, height: BlockHeight) -> Currency;

    /// Drop pooled transactions invalidated by a committed reorganization.
    fn clean_transaction_pool(&mut self);

    /// Feed executor-private state into the consensus state digest.
    fn state_digest(&self, hasher: &mut blake3::Hasher);
}

/// Native transfer semantics: inputs spend unspent outputs, outputs create
/// new ones, surpluses are declared as miner fees.
///
/// Spent outputs are journaled so inversion can restore their full contents
/// without consulting anything outside the executor.
#[derive(Debug, Default)]
pub struct NativeExecutor {
    spent: HashMap<OutputId, Output>,
}

impl NativeExecutor {
    /// Create an executor with an empty spend journal
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionExecutor for NativeExecutor {
    fn validate_transaction(&self, ledger: &UtxoLedger, txn: &Transaction) -> UtxoResult<()> {
        // No duplicate inputs within the transaction.
        let mut seen: HashSet<OutputId> = HashSet::with_capacity(txn.inputs.len());
        for input in &txn.inputs {
            if !seen.insert(*input) {
                return Err(UtxoError::DuplicateInput(*input));
            }
        }

        // Every input must be unspent. Distinguish "never existed" from
        // "already consumed" for better peer diagnostics.
        let mut total_input: Currency = 0;
        for input in &txn.inputs {
            let output = match ledger.output(input) {
                Some(output) => output,
                None if self.spent.contains_key(input) => {
                    return Err(UtxoError::AlreadySpent(*input));
                }
                None => return Err(UtxoError::UnknownOutput(*input)),
            };
            total_input = total_input
                .checked_add(output.value)
                .ok_or(UtxoError::Overflow)?;
        }

        let mut total_output: Currency = 0;
        for output in &txn.outputs {
            total_output = total_output
                .checked_add(output.value)
                .ok_or(UtxoError::Overflow)?;
        }
        let total_fees = txn.total_fees().ok_or(UtxoError::Overflow)?;

        // Strict conservation: inputs == outputs + fees.
        let required = total_output
            .checked_add(total_fees)
            .ok_or(UtxoError::Overflow)?;
        if total_input != required {
            return Err(UtxoError::ValueMismatch {
                inputs: total_input,
                outputs: total_output,
                fees: total_fees,
            });
        }

        Ok(())
    }

    fn apply_transaction(&mut self, ledger: &mut UtxoLedger, txn: &Transaction) -> TransactionDiff {
        let mut diff = TransactionDiff::default();

        for input in &txn.inputs {
            let output = match ledger.remove(input) {
                Some(output) => output,
                None => panic!("apply_transaction called on unvalidated transaction"),
            };
            self.spent.insert(*input, output);
            diff.output_diffs.push(OutputDiff {
                new: false,
                id: *input,
                output,
            });
        }

        for (index, output) in txn.outputs.iter().enumerate() {
            let id = txn.output_id(index as u32);
            ledger.insert(id, *output);
            diff.output_diffs.push(OutputDiff {
                new: true,
                id,
                output: *output,
            });
        }

        diff
    }

    fn invert_transaction(&mut self, ledger: &mut UtxoLedger, txn: &Transaction) -> Vec<OutputDiff> {
        let mut diffs = Vec::new();

        // Delete created outputs, newest first.
        for (index, _) in txn.outputs.iter().enumerate().rev() {
            let id = txn.output_id(index as u32);
            let output = match ledger.remove(&id) {
                Some(output) => output,
                None => panic!("invert_transaction does not mirror a prior apply"),
            };
            diffs.push(OutputDiff {
                new: false,
                id,
                output,
            });
        }

        // Restore consumed inputs from the spend journal.
        for input in txn.inputs.iter().rev() {
            let output = match self.spent.remove(input) {
                Some(output) => output,
                None => panic!("invert_transaction does not mirror a prior apply"),
            };
            ledger.insert(*input, output);
            diffs.push(OutputDiff {
                new: true,
                id: *input,
                output,
            });
        }

        diffs
    }

    fn apply_contract_maintenance(
        &mut self,
        _ledger: &mut UtxoLedger,
        _height: BlockHeight,
        _changes: &mut TransactionDiff,
    ) -> Vec<OutputDiff> {
        // Native transfers carry no contract state; the lifecycle hook is
        // still invoked every block so stateful executors slot in unchanged.
        Vec::new()
    }

    fn invert_contract_maintenance(&mut self, _ledger: &mut UtxoLedger) -> Vec<OutputDiff> {
        Vec::new()
    }

    fn calculate_coinbase(&self, height: BlockHeight) -> Currency {
        COINBASE_BASE.saturating_sub(height).max(COINBASE_FLOOR)
    }

    fn clean_transaction_pool(&mut self) {
        // No pool attached to the native executor.
    }

    fn state_digest(&self, hasher: &mut blake3::Hasher) {
        let mut ids: Vec<&OutputId> = self.spent.keys().collect();
        ids.sort();
        hasher.update(&(ids.len() as u64).to_le_bytes());
        for id in ids {
            let output = &self.spent[id];
            hasher.update(id.as_bytes());
            hasher.update(&output.value.to_le_bytes());
            hasher.update(output.spend_hash.as_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_types::Address;

    fn seeded_ledger() -> (UtxoLedger, OutputId) {
        let mut ledger = UtxoLedger::new();
        let id = OutputId::new([1u8; 32]);
        ledger.insert(id, Output::new(1000, Address::new([9u8; 32])));
        (ledger, id)
    }

    fn transfer(input: OutputId, value: Currency, fee: Currency) -> Transaction {
        Transaction {
            inputs: vec![input],
            outputs: vec![Output::new(value, Address::new([2u8; 32]))],
            miner_fees: vec![fee],
        }
    }

    fn full_digest(executor: &NativeExecutor, ledger: &UtxoLedger) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        ledger.digest(&mut hasher);
        executor.state_digest(&mut hasher);
        hasher.finalize().into()
    }

    #[test]
    fn test_validate_accepts_balanced_transfer() {
        let (ledger, id) = seeded_ledger();
        let executor = NativeExecutor::new();
        assert!(executor
            .validate_transaction(&ledger, &transfer(id, 900, 100))
            .is_ok());
    }

    #[test]
    fn test_validate_rejects_unknown_output() {
        let (ledger, _) = seeded_ledger();
        let executor = NativeExecutor::new();
        let missing = OutputId::new([7u8; 32]);
        assert_eq!(
            executor.validate_transaction(&ledger, &transfer(missing, 900, 100)),
            Err(UtxoError::UnknownOutput(missing))
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_input() {
        let (ledger, id) = seeded_ledger();
        let executor = NativeExecutor::new();
        let txn = Transaction {
            inputs: vec![id, id],
            outputs: vec![Output::new(1900, Address::new([2u8; 32]))],
            miner_fees: vec![100],
        };
        assert_eq!(
            executor.validate_transaction(&ledger, &txn),
            Err(UtxoError::DuplicateInput(id))
        );
    }

    #[test]
    fn test_validate_rejects_value_mismatch() {
        let (ledger, id) = seeded_ledger();
        let executor = NativeExecutor::new();
        assert!(matches!(
            executor.validate_transaction(&ledger, &transfer(id, 800, 100)),
            Err(UtxoError::ValueMismatch { .. })
        ));
    }

    #[test]
    fn test_spend_then_respend_reports_already_spent() {
        let (mut ledger, id) = seeded_ledger();
        let mut executor = NativeExecutor::new();
        let txn = transfer(id, 900, 100);

        executor.apply_transaction(&mut ledger, &txn);
        assert_eq!(
            executor.validate_transaction(&ledger, &txn),
            Err(UtxoError::AlreadySpent(id))
        );
    }

    #[test]
    fn test_apply_invert_roundtrip_restores_digest() {
        let (mut ledger, id) = seeded_ledger();
        let mut executor = NativeExecutor::new();
        let txn = transfer(id, 900, 100);

        let before = full_digest(&executor, &ledger);
        executor.apply_transaction(&mut ledger, &txn);
        assert_ne!(full_digest(&executor, &ledger), before);

        executor.invert_transaction(&mut ledger, &txn);
        assert_eq!(full_digest(&executor, &ledger), before);
        assert!(ledger.contains(&id));
    }

    #[test]
    fn test_apply_emits_spend_then_create_diffs() {
        let (mut ledger, id) = seeded_ledger();
        let mut executor = NativeExecutor::new();
        let txn = transfer(id, 900, 100);

        let diff = executor.apply_transaction(&mut ledger, &txn);
        assert_eq!(diff.output_diffs.len(), 2);
        assert!(!diff.output_diffs[0].new);
        assert_eq!(diff.output_diffs[0].id, id);
        assert!(diff.output_diffs[1].new);
        assert_eq!(diff.output_diffs[1].id, txn.output_id(0));
    }

    #[test]
    fn test_coinbase_schedule() {
        let executor = NativeExecutor::new();
        assert_eq!(executor.calculate_coinbase(0), COINBASE_BASE);
        assert_eq!(executor.calculate_coinbase(1), COINBASE_BASE - 1);
        assert_eq!(executor.calculate_coinbase(10_000_000), COINBASE_FLOOR);
    }
}
