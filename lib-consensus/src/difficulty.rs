//! Difficulty retargeting and chain weight
//!
//! The per-block target adjusts toward one block per `BLOCK_FREQUENCY`
//! seconds, measured over a window of up to `TARGET_WINDOW` ancestors, with
//! the per-step adjustment clamped so timestamp games cannot move difficulty
//! faster than a fraction of a percent per block. Chain weight (`depth`)
//! accumulates each block's `1/target` work; the canonical chain only yields
//! to a fork that out-weighs it by `SURPASS_THRESHOLD` of one block's work.

use num_bigint::BigUint;

use lib_types::{BlockHash, BlockHeight};

use crate::block::Block;
use crate::node::BlockNode;
use crate::params::{
    BLOCK_FREQUENCY, MAX_ADJUSTMENT_DOWN, MAX_ADJUSTMENT_UP, SURPASS_THRESHOLD, TARGET_WINDOW,
};
use crate::state::State;
use crate::target::{Ratio, Target};

impl State {
    /// Proof-of-work threshold imposed on children of the block being added.
    ///
    /// The retarget anchor is found by walking the child's own parent chain,
    /// so the measurement is correct on every fork, not just the canonical
    /// one.
    pub(crate) fn child_target(
        &self,
        parent: &BlockNode,
        child: &Block,
        child_height: BlockHeight,
    ) -> Target {
        let window = child_height.min(TARGET_WINDOW);

        // The anchor sits `window` blocks above the child: `window - 1`
        // parent hops starting from the parent itself.
        let mut anchor = parent;
        for _ in 0..window.saturating_sub(1) {
            anchor = self.node(&anchor.block.parent_id);
        }

        let expected_elapsed = BLOCK_FREQUENCY * window;
        let elapsed = child.timestamp as i128 - anchor.block.timestamp as i128;

        // Timestamps may legally run backwards within the median barrier; a
        // non-positive elapsed time pins the adjustment at its lower clamp.
        let adjustment = if elapsed <= 0 {
            Ratio::new(MAX_ADJUSTMENT_DOWN.0, MAX_ADJUSTMENT_DOWN.1)
        } else {
            clamp_adjustment(Ratio::from_big(
                BigUint::from(elapsed as u128),
                BigUint::from(expected_elapsed),
            ))
        };

        parent.target.mul_ratio(&adjustment)
    }

    /// Cumulative chain weight of a child of `parent`:
    /// `(parent.target⁻¹ + parent.depth⁻¹)⁻¹`.
    ///
    /// `depth⁻¹` reads as "total work to reach this node"; storing the
    /// reciprocal keeps depth in the same 256-bit form as targets.
    pub(crate) fn child_depth(&self, parent: &BlockNode) -> Target {
        Target::from_ratio(&parent.target.inverse().add(&parent.depth.inverse()).inv())
    }

    /// Whether `candidate` out-weighs the canonical tip by more than the
    /// surpass threshold.
    pub(crate) fn heavier_fork(&self, candidate: &BlockHash) -> bool {
        let candidate_node = self.node(candidate);
        let tip = self.canonical_tip_node();

        let threshold = tip
            .target
            .inverse()
            .mul(&Ratio::new(SURPASS_THRESHOLD.0, SURPASS_THRESHOLD.1));
        candidate_node.depth.inverse() > tip.depth.inverse().add(&threshold)
    }
}

/// Clamp a retarget adjustment into the allowed per-block band.
fn clamp_adjustment(adjustment: Ratio) -> Ratio {
    let up = Ratio::new(MAX_ADJUSTMENT_UP.0, MAX_ADJUSTMENT_UP.1);
    let down = Ratio::new(MAX_ADJUSTMENT_DOWN.0, MAX_ADJUSTMENT_DOWN.1);
    if adjustment > up {
        up
    } else if adjustment < down {
        down
    } else {
        adjustment
    }
}
