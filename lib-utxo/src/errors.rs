//! UTXO Errors

use thiserror::Error;
use lib_types::{Currency, OutputId};

/// Error during UTXO transaction validation or execution
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UtxoError {
    #[error("output not found: {0:?}")]
    UnknownOutput(OutputId),

    #[error("output already spent: {0:?}")]
    AlreadySpent(OutputId),

    #[error("duplicate input: {0:?}")]
    DuplicateInput(OutputId),

    #[error("value mismatch: inputs={inputs}, outputs={outputs}, fees={fees}")]
    ValueMismatch {
        inputs: Currency,
        outputs: Currency,
        fees: Currency,
    },

    #[error("arithmetic overflow")]
    Overflow,
}

/// Result type for UTXO operations
pub type UtxoResult<T> = Result<T, UtxoError>;
