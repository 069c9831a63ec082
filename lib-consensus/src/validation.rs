//! Header validation
//!
//! Contextual checks a block must pass before it enters the tree, in a fixed
//! order: proof-of-work target, future-timestamp policy, median-past
//! timestamp barrier, and the Merkle commitment. Checks that prove the block
//! can never be valid record its id in the bad-block set; the
//! future-timestamp check does not, because the same block becomes acceptable
//! once the local clock catches up.

use tracing::{debug, warn};

use lib_types::Timestamp;

use crate::block::Block;
use crate::error::{ConsensusError, ConsensusResult};
use crate::params::FUTURE_THRESHOLD;
use crate::state::State;

impl State {
    /// Validate everything about `block` except its transactions.
    ///
    /// Precondition: the destiny check passed, so the parent is in the tree.
    pub(crate) fn validate_header(&mut self, block: &Block, now: Timestamp) -> ConsensusResult<()> {
        let id = block.id();
        let (parent_target, earliest_timestamp) = {
            let Some(parent) = self.block_map.get(&block.parent_id) else {
                // Unreachable after check_destiny; classified as an orphan
                // rather than panicking on a protocol-visible path.
                return Err(ConsensusError::UnknownOrphan);
            };
            (parent.target, parent.earliest_child_timestamp())
        };

        // Proof of work: the block id must fall at or below the parent's
        // target.
        if !parent_target.meets(id) {
            return Err(ConsensusError::WorkBelowTarget);
        }

        // Future timestamps defer rather than reject: the block is not
        // recorded anywhere and acceptance is retried once the skew decays.
        if block.timestamp > now + FUTURE_THRESHOLD {
            let retry_after = block.timestamp - now - FUTURE_THRESHOLD;
            debug!("Deferring future block {} for {}s", id, retry_after);
            return Err(ConsensusError::FutureBlock { retry_after });
        }

        // Median-past barrier: a timestamp below the median of the parent's
        // recent-timestamp window can never become valid.
        if block.timestamp < earliest_timestamp {
            warn!(
                "Rejecting block {}: timestamp {} below median barrier {}",
                id, block.timestamp, earliest_timestamp
            );
            self.bad_blocks.insert(id);
            return Err(ConsensusError::TimestampTooEarly);
        }

        // The declared Merkle root must commit to exactly the carried
        // transactions.
        if block.merkle_root != block.transaction_merkle_root() {
            warn!("Rejecting block {}: merkle root mismatch", id);
            self.bad_blocks.insert(id);
            return Err(ConsensusError::MerkleMismatch);
        }

        Ok(())
    }
}
