//! Block acceptance tests
//!
//! Covers linear growth, fork staging, orphan handling, the protocol size
//! limit, the median-past barrier, subsidy conservation, and subscriber
//! notification ordering.

mod common;

use common::*;
use lib_consensus::ConsensusError;
use lib_types::Address;
use lib_utxo::COINBASE_BASE;

#[tokio::test]
async fn test_linear_growth_advances_tip() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    let b1 = empty_block(engine.genesis_id(), 1_600);
    let b2 = empty_block(b1.id(), 2_200);
    let b3 = empty_block(b2.id(), 2_800);

    for block in [&b1, &b2, &b3] {
        let accepted = engine.accept_block(block.clone()).unwrap();
        assert!(accepted.rewound_blocks.is_empty(), "no rewinds on linear growth");
        assert_eq!(accepted.applied_blocks.len(), 1);
        assert_eq!(accepted.applied_blocks[0].id(), block.id());
    }

    assert_eq!(engine.height(), 3);
    assert_eq!(engine.current_block().id(), b3.id());
}

#[tokio::test]
async fn test_canonical_path_is_parent_linked() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    let b1 = empty_block(engine.genesis_id(), 1_600);
    let b2 = empty_block(b1.id(), 2_200);
    engine.accept_block(b1.clone()).unwrap();
    engine.accept_block(b2.clone()).unwrap();

    for height in 1..=engine.height() {
        let block = engine.block_at_height(height).unwrap();
        let parent = engine.block_at_height(height - 1).unwrap();
        assert_eq!(block.parent_id, parent.id());
    }
}

#[tokio::test]
async fn test_duplicate_block_is_known() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    let b1 = empty_block(engine.genesis_id(), 1_600);
    engine.accept_block(b1.clone()).unwrap();
    assert_eq!(engine.accept_block(b1), Err(ConsensusError::BlockKnown));
}

#[tokio::test]
async fn test_shorter_fork_is_ignored() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    let b1 = empty_block(engine.genesis_id(), 1_600);
    let b2 = empty_block(b1.id(), 2_200);
    let b3 = empty_block(b2.id(), 2_800);
    for block in [&b1, &b2, &b3] {
        engine.accept_block(block.clone()).unwrap();
    }

    // A sibling of b2: same height, equal depth, nowhere near the surpass
    // threshold. The tip must not move.
    let b2_prime = empty_block(b1.id(), 2_250);
    let accepted = engine.accept_block(b2_prime).unwrap();
    assert!(accepted.rewound_blocks.is_empty());
    assert!(accepted.applied_blocks.is_empty());
    assert_eq!(engine.current_block().id(), b3.id());
    assert_eq!(engine.height(), 3);
}

#[tokio::test]
async fn test_orphan_staging_and_replay() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    let c1 = empty_block(engine.genesis_id(), 1_600);
    let c2 = empty_block(c1.id(), 2_200);

    // Child before parent: staged, then recognized.
    assert_eq!(
        engine.accept_block(c2.clone()),
        Err(ConsensusError::UnknownOrphan)
    );
    assert_eq!(
        engine.accept_block(c2.clone()),
        Err(ConsensusError::KnownOrphan)
    );
    assert_eq!(engine.height(), 0, "orphans never touch the chain");

    // Parent lands; the caller replays the staged orphans.
    engine.accept_block(c1.clone()).unwrap();
    let staged = engine.take_orphans(&c1.id());
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].id(), c2.id());

    engine.accept_block(staged[0].clone()).unwrap();
    assert_eq!(engine.height(), 2);
    assert_eq!(engine.current_block().id(), c2.id());
}

#[tokio::test]
async fn test_oversized_block_is_rejected_but_not_bad() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    // One transaction with enough outputs to push the encoding past the
    // limit. The size check runs before the ledger ever sees it.
    let bloated = lib_utxo::Transaction {
        inputs: Vec::new(),
        outputs: vec![lib_utxo::Output::new(1, Address::zero()); 30_000],
        miner_fees: Vec::new(),
    };
    let block = mine_block(engine.genesis_id(), 1_600, Address::zero(), vec![bloated]);

    let first = engine.accept_block(block.clone());
    assert!(matches!(first, Err(ConsensusError::BlockTooLarge { .. })));

    // Not recorded as bad: a peer could retransmit a conforming encoding.
    let second = engine.accept_block(block);
    assert!(
        matches!(second, Err(ConsensusError::BlockTooLarge { .. })),
        "oversized block must not be remembered as known or invalid"
    );
    assert_eq!(engine.height(), 0);
}

#[tokio::test]
async fn test_median_past_barrier_on_grown_chain() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    // Six blocks past genesis: the tip's window is [1000 ×5, 1600..=4600],
    // so the median barrier sits at 1600.
    let mut parent = engine.genesis_id();
    for step in 1..=6u64 {
        let block = empty_block(parent, 1_000 + step * 600);
        parent = block.id();
        engine.accept_block(block).unwrap();
    }

    let too_early = empty_block(parent, 1_599);
    assert_eq!(
        engine.accept_block(too_early.clone()),
        Err(ConsensusError::TimestampTooEarly)
    );
    // Permanently invalid from now on.
    assert_eq!(
        engine.accept_block(too_early),
        Err(ConsensusError::InvalidBlockKnown)
    );

    // Exactly the median is allowed.
    let on_barrier = empty_block(parent, 1_600);
    engine.accept_block(on_barrier).unwrap();
    assert_eq!(engine.height(), 7);
}

#[tokio::test]
async fn test_subsidy_conserves_fees_plus_coinbase() {
    let (premine_id, premine) = premined_output(1_000);
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, vec![(premine_id, premine)]);

    let miner = Address::new([0x11; 32]);
    let txn = spend(premine_id, 900, 100);
    let b1 = mine_block(engine.genesis_id(), 1_600, miner, vec![txn.clone()]);
    engine.accept_block(b1.clone()).unwrap();

    // The premine is spent, its replacement exists, and the subsidy output
    // holds fees + coinbase credited to the miner.
    assert!(engine.output(&premine_id).is_none());
    assert_eq!(engine.output(&txn.output_id(0)).unwrap().value, 900);

    let subsidy = engine.output(&b1.subsidy_id()).unwrap();
    assert_eq!(subsidy.value, 100 + (COINBASE_BASE - 1));
    assert_eq!(subsidy.spend_hash, miner);
}

#[tokio::test]
async fn test_subscribers_see_changes_in_commit_order() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());
    let mut changes = engine.subscribe();

    let b1 = empty_block(engine.genesis_id(), 1_600);
    let b2 = empty_block(b1.id(), 2_200);
    engine.accept_block(b1.clone()).unwrap();
    engine.accept_block(b2.clone()).unwrap();

    // A rejected block publishes nothing.
    assert_eq!(
        engine.accept_block(b1.clone()),
        Err(ConsensusError::BlockKnown)
    );

    let first = changes.try_recv().unwrap();
    assert_eq!(first.applied_blocks.len(), 1);
    assert_eq!(first.applied_blocks[0].catalyst, b1.id());

    let second = changes.try_recv().unwrap();
    assert_eq!(second.applied_blocks[0].catalyst, b2.id());

    assert!(changes.try_recv().is_err(), "no change for a failed accept");
}

#[tokio::test]
async fn test_sibling_fork_publishes_empty_change() {
    let (engine, _clock) = test_engine(FAR_FUTURE_NOW, Vec::new());

    let b1 = empty_block(engine.genesis_id(), 1_600);
    let b2 = empty_block(b1.id(), 2_200);
    engine.accept_block(b1.clone()).unwrap();
    engine.accept_block(b2).unwrap();

    let mut changes = engine.subscribe();
    let b1_sibling = empty_block(engine.genesis_id(), 1_650);
    engine.accept_block(b1_sibling).unwrap();

    let change = changes.try_recv().unwrap();
    assert!(change.is_empty(), "a non-canonical accept carries no diffs");
}
