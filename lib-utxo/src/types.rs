//! UTXO Types
//!
//! Core types for UTXO-based transactions and the ledger diffs the consensus
//! engine emits for every mutation.

use serde::{Deserialize, Serialize};
use lib_types::{Address, BlockHash, Currency, OutputId, TxHash};

/// Unspent Transaction Output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Amount held by the output
    pub value: Currency,
    /// Hash of the spend conditions that unlock the output
    pub spend_hash: Address,
}

impl Output {
    /// Create a new output
    pub const fn new(value: Currency, spend_hash: Address) -> Self {
        Self { value, spend_hash }
    }
}

/// A transfer transaction
///
/// Inputs name existing unspent outputs by id; outputs are the new entries
/// the transaction creates. Any surplus of inputs over outputs is declared in
/// `miner_fees` and credited to the block's subsidy output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unspent outputs consumed by this transaction
    pub inputs: Vec<OutputId>,
    /// Outputs created by this transaction
    pub outputs: Vec<Output>,
    /// Fees paid to the miner of the including block
    pub miner_fees: Vec<Currency>,
}

impl Transaction {
    /// Canonical transaction hash.
    ///
    /// The consensus hash of the transaction's canonical byte encoding:
    /// every consensus-relevant field, length-prefixed, in fixed order. Two
    /// transactions with the same hash are the same transaction.
    pub fn hash(&self) -> TxHash {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            bytes.extend_from_slice(input.as_bytes());
        }
        bytes.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            bytes.extend_from_slice(&output.value.to_le_bytes());
            bytes.extend_from_slice(output.spend_hash.as_bytes());
        }
        bytes.extend_from_slice(&(self.miner_fees.len() as u32).to_le_bytes());
        for fee in &self.miner_fees {
            bytes.extend_from_slice(&fee.to_le_bytes());
        }
        TxHash::new(lib_crypto::canonical_consensus_hash(&bytes))
    }

    /// Deterministic id of the output created at `index`.
    pub fn output_id(&self, index: u32) -> OutputId {
        output_id(self.hash(), index)
    }

    /// Sum of declared miner fees, checked against overflow.
    pub fn total_fees(&self) -> Option<Currency> {
        self.miner_fees
            .iter()
            .try_fold(0u64, |acc, fee| acc.checked_add(*fee))
    }

    /// Merkle leaf commitment for this transaction.
    pub fn leaf_hash(&self) -> [u8; 32] {
        lib_crypto::leaf_hash(self.hash().as_bytes())
    }
}

/// Derive the id of the `index`-th output of the transaction with `tx_hash`.
pub fn output_id(tx_hash: TxHash, index: u32) -> OutputId {
    OutputId::new(lib_crypto::hash_blake3_multiple(&[
        tx_hash.as_bytes(),
        &index.to_le_bytes(),
    ]))
}

/// Merkle root committing to an ordered transaction list.
pub fn transaction_merkle_root(transactions: &[Transaction]) -> [u8; 32] {
    let leaves: Vec<[u8; 32]> = transactions.iter().map(Transaction::leaf_hash).collect();
    lib_crypto::merkle_root(&leaves)
}

// ============================================================================
// DIFF TYPES
// ============================================================================

/// A single ledger mutation.
///
/// `new = true` records the creation of `id`; `new = false` records its
/// deletion. The carried output is the full value either way, so a diff can
/// be replayed forwards or backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputDiff {
    /// Whether the output was created (`true`) or deleted (`false`)
    pub new: bool,
    /// Id of the mutated output
    pub id: OutputId,
    /// The output's contents
    pub output: Output,
}

/// Ledger mutations produced by applying one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDiff {
    /// Output-level mutations, in application order
    pub output_diffs: Vec<OutputDiff>,
}

/// Ledger mutations produced by integrating one block.
///
/// Cached on the block's tree node while the block is canonical so the engine
/// can report inversions without re-executing transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDiff {
    /// Id of the block that produced these mutations
    pub catalyst: BlockHash,
    /// Per-transaction mutations, in block order
    pub transaction_diffs: Vec<TransactionDiff>,
    /// Block-level mutations: contract maintenance plus the subsidy output
    pub block_changes: TransactionDiff,
}
