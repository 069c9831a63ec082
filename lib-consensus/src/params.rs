//! Consensus parameters
//!
//! Wire-level constants. Every implementation on the network must use
//! identical values; changing any of them is a hard fork.

use lib_types::Timestamp;

use crate::target::Target;

/// Number of trailing timestamps consulted for the median-past rule.
///
/// A block's timestamp must not be earlier than the median timestamp of its
/// 11 closest ancestors. This bounds how far a miner can push timestamps
/// backwards without being rejected outright.
pub const MEDIAN_TIMESTAMP_WINDOW: usize = 11;

/// Maximum tolerated clock skew into the future, in seconds.
///
/// Blocks further ahead than this are not rejected permanently; acceptance is
/// retried once the skew has decayed.
pub const FUTURE_THRESHOLD: Timestamp = 3 * 60 * 60;

/// Number of blocks the difficulty retarget looks back over.
pub const TARGET_WINDOW: u64 = 5_000;

/// Expected seconds between blocks.
pub const BLOCK_FREQUENCY: Timestamp = 600;

/// Upper clamp on the per-block target adjustment, as (numerator, denominator).
pub const MAX_ADJUSTMENT_UP: (u64, u64) = (1_001, 1_000);

/// Lower clamp on the per-block target adjustment, as (numerator, denominator).
pub const MAX_ADJUSTMENT_DOWN: (u64, u64) = (999, 1_000);

/// Maximum encoded block size in bytes.
pub const BLOCK_SIZE_LIMIT: usize = 1_000_000;

/// How much heavier a competing chain must be before the engine switches to
/// it, as a fraction of *one block's* work (not of the whole chain).
///
/// The difficulty updates every block, so of two competing tips one is almost
/// always very slightly heavier. A tip that was not seen first should not
/// dislodge the incumbent over an inconsequential weight difference; the
/// bounded per-block adjustment keeps timestamp manipulation from
/// manufacturing a gap larger than this threshold.
pub const SURPASS_THRESHOLD: (u64, u64) = (5, 100);

const fn root_target_bytes() -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes[1] = 1;
    bytes
}

/// Proof-of-work threshold for children of the genesis block.
pub const ROOT_TARGET: Target = Target::new(root_target_bytes());

/// Cumulative-weight seed for the genesis block (no work accumulated).
pub const ROOT_DEPTH: Target = Target::new([0xFF; 32]);
