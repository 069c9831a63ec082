//! Meridian UTXO Execution
//!
//! This crate provides the output/transaction model the consensus engine
//! maintains in lock-step with the canonical chain, plus the execution seam
//! that keeps transaction semantics out of consensus itself.
//!
//! # Key Rules
//!
//! 1. **Inputs must exist**: every referenced output must be unspent
//! 2. **No double spend**: an output is consumed at most once
//! 3. **Conservation**: `sum(inputs) == sum(outputs) + sum(miner_fees)`
//! 4. **Inverse-ready**: every apply has an exact invert, or reorgs corrupt
//!    the ledger

pub mod types;
pub mod ledger;
pub mod executor;
pub mod errors;

pub use types::{
    output_id, transaction_merkle_root, BlockDiff, Output, OutputDiff, Transaction,
    TransactionDiff,
};
pub use ledger::UtxoLedger;
pub use executor::{NativeExecutor, TransactionExecutor, COINBASE_BASE, COINBASE_FLOOR};
pub use errors::{UtxoError, UtxoResult};
