//! Meridian primitives.
//! Stable, protocol-neutral, behavior-free.

pub mod primitives;

pub use primitives::{Address, BlockHash, BlockHeight, Currency, OutputId, Timestamp, TxHash};
