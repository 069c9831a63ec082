//! Consensus state
//!
//! The single-owner state machine: block tree, canonical chain, UTXO ledger,
//! and subscriber registry. Every public entry point runs to completion under
//! one lock (owned by the engine wrapper); nothing here suspends.
//!
//! Between `accept_block` calls the state upholds:
//! - the canonical path is dense (`0..=tip.height`) and parent-linked
//! - every canonical id is in the block map and none is recorded bad
//! - the block map and the bad-block set are disjoint
//! - a block is staged as an orphan only while its parent is unknown
//! - the ledger equals the replay of every canonical block's integration

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use lib_types::{Address, BlockHash, BlockHeight, OutputId, Timestamp};
use lib_utxo::{Output, OutputDiff, TransactionExecutor, UtxoLedger};

use crate::block::Block;
use crate::error::{ConsensusError, ConsensusResult};
use crate::events::ConsensusChange;
use crate::node::BlockNode;
use crate::orphans::OrphanPool;
use crate::params::BLOCK_SIZE_LIMIT;
use crate::target::Target;

/// Parameters fixing the genesis block and initial ledger contents.
#[derive(Debug, Clone)]
pub struct GenesisConfig {
    /// Genesis block timestamp
    pub timestamp: Timestamp,
    /// Address named by the genesis header (no subsidy is paid for genesis)
    pub miner_address: Address,
    /// Outputs seeded into the ledger at height 0
    pub allocation: Vec<(OutputId, Output)>,
}

impl GenesisConfig {
    /// Genesis at `timestamp` with an empty initial ledger
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            miner_address: Address::zero(),
            allocation: Vec::new(),
        }
    }

    /// Seed the initial ledger
    pub fn with_allocation(mut self, allocation: Vec<(OutputId, Output)>) -> Self {
        self.allocation = allocation;
        self
    }
}

/// Result of a successful `accept_block` call.
///
/// All three vectors are empty unless the acceptance moved the canonical
/// chain through a reorganization (a plain chain extension reports itself in
/// `applied_blocks`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptedBlock {
    /// Blocks removed from the canonical chain, old tip first
    pub rewound_blocks: Vec<Block>,
    /// Blocks added to the canonical chain, new tip last
    pub applied_blocks: Vec<Block>,
    /// Every ledger mutation performed, in execution order
    pub output_diffs: Vec<OutputDiff>,
}

/// The consensus state machine.
pub struct State {
    pub(crate) block_map: HashMap<BlockHash, BlockNode>,
    pub(crate) bad_blocks: HashSet<BlockHash>,
    pub(crate) orphans: OrphanPool,
    pub(crate) genesis_id: BlockHash,
    pub(crate) current_block_id: BlockHash,
    pub(crate) current_path: BTreeMap<BlockHeight, BlockHash>,
    pub(crate) ledger: UtxoLedger,
    pub(crate) executor: Box<dyn TransactionExecutor>,
    subscribers: Vec<UnboundedSender<ConsensusChange>>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("height", &self.height())
            .field("current_block_id", &self.current_block_id)
            .field("blocks", &self.block_map.len())
            .field("bad_blocks", &self.bad_blocks.len())
            .field("orphans", &self.orphans.len())
            .field("unspent_outputs", &self.ledger.len())
            .finish()
    }
}

impl State {
    /// Create a state rooted at the configured genesis block.
    pub fn new(config: GenesisConfig, executor: Box<dyn TransactionExecutor>) -> Self {
        let genesis = Block {
            parent_id: BlockHash::zero(),
            timestamp: config.timestamp,
            nonce: 0,
            miner_address: config.miner_address,
            merkle_root: [0u8; 32],
            transactions: Vec::new(),
        };
        let genesis_id = genesis.id();

        let mut block_map = HashMap::new();
        block_map.insert(genesis_id, BlockNode::genesis(genesis));

        let mut current_path = BTreeMap::new();
        current_path.insert(0, genesis_id);

        let mut ledger = UtxoLedger::new();
        for (id, output) in config.allocation {
            ledger.insert(id, output);
        }

        info!("Consensus state initialized at genesis {}", genesis_id);

        Self {
            block_map,
            bad_blocks: HashSet::new(),
            orphans: OrphanPool::new(),
            genesis_id,
            current_block_id: genesis_id,
            current_path,
            ledger,
            executor,
            subscribers: Vec::new(),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Look up a node. Internal invariant: every id handed to this function
    /// was placed in the block map earlier in the same critical section.
    pub(crate) fn node(&self, id: &BlockHash) -> &BlockNode {
        self.block_map
            .get(id)
            .expect("block id not present in block map")
    }

    /// Node of the canonical tip
    pub(crate) fn canonical_tip_node(&self) -> &BlockNode {
        self.node(&self.current_block_id)
    }

    /// Id of the genesis block
    pub fn genesis_id(&self) -> BlockHash {
        self.genesis_id
    }

    /// The canonical tip block
    pub fn current_block(&self) -> &Block {
        &self.canonical_tip_node().block
    }

    /// Height of the canonical tip
    pub fn height(&self) -> BlockHeight {
        self.canonical_tip_node().height
    }

    /// Cumulative weight of the canonical chain, as an equivalent target
    pub fn depth(&self) -> Target {
        self.canonical_tip_node().depth
    }

    /// Proof-of-work threshold for children of the canonical tip
    pub fn current_target(&self) -> Target {
        self.canonical_tip_node().target
    }

    /// Look up an unspent output
    pub fn output(&self, id: &OutputId) -> Option<&Output> {
        self.ledger.output(id)
    }

    /// The canonical block at `height`, if the chain is that tall
    pub fn block_at_height(&self, height: BlockHeight) -> Option<&Block> {
        self.current_path
            .get(&height)
            .map(|id| &self.node(id).block)
    }

    /// Any known-valid block by id (canonical or not)
    pub fn block(&self, id: &BlockHash) -> Option<&Block> {
        self.block_map.get(id).map(|node| &node.block)
    }

    /// Remove and return the orphans waiting on `parent_id` for replay.
    pub fn take_orphans(&mut self, parent_id: &BlockHash) -> Vec<Block> {
        self.orphans.take_children(parent_id)
    }

    /// Register a subscriber. The returned stream yields one
    /// [`ConsensusChange`] per successful `accept_block`, in commit order.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ConsensusChange> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.push(sender);
        receiver
    }

    /// Publish a committed change to every live subscriber, pruning closed
    /// receivers. Unbounded sends never block the state machine.
    fn publish(&mut self, change: ConsensusChange) {
        self.subscribers
            .retain(|subscriber| subscriber.send(change.clone()).is_ok());
    }

    /// Deterministic digest of all committed consensus state: the canonical
    /// path, the ledger, and executor-private state.
    ///
    /// Tree indices (`block_map`, `bad_blocks`) are deliberately excluded:
    /// they record what the node has *seen*, not what the chain *is*, and a
    /// rolled-back reorganization legitimately grows them while leaving the
    /// committed state untouched.
    pub fn state_hash(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"meridian/consensus-state/v1");
        hasher.update(self.current_block_id.as_bytes());
        hasher.update(&(self.current_path.len() as u64).to_le_bytes());
        for (height, id) in &self.current_path {
            hasher.update(&height.to_le_bytes());
            hasher.update(id.as_bytes());
        }
        self.ledger.digest(&mut hasher);
        self.executor.state_digest(&mut hasher);
        hasher.finalize().into()
    }

    // ========================================================================
    // DESTINY CHECK
    // ========================================================================

    /// Reject early if the block's fate is already decided: known-invalid,
    /// already accepted, or an orphan (which is staged as a side effect).
    pub(crate) fn check_destiny(&mut self, block: &Block) -> ConsensusResult<()> {
        let id = block.id();
        if self.bad_blocks.contains(&id) {
            return Err(ConsensusError::InvalidBlockKnown);
        }
        if self.block_map.contains_key(&id) {
            return Err(ConsensusError::BlockKnown);
        }
        if !self.block_map.contains_key(&block.parent_id) {
            debug!("Staging orphan {} waiting on parent {}", id, block.parent_id);
            return Err(self.orphans.stage(block.clone()));
        }
        Ok(())
    }

    // ========================================================================
    // TREE INSERTION
    // ========================================================================

    /// Add a validated block to the tree under its parent. No ledger
    /// mutation happens here; the block only becomes canonical through a
    /// reorganization.
    pub(crate) fn add_to_tree(&mut self, block: Block) -> BlockHash {
        let parent_id = block.parent_id;
        let (height, window, target, depth) = {
            let parent = self.node(&parent_id);
            let height = parent.height + 1;
            let window = parent.child_window(block.timestamp);
            let target = self.child_target(parent, &block, height);
            let depth = self.child_depth(parent);
            (height, window, target, depth)
        };

        let id = block.id();
        self.block_map.insert(
            id,
            BlockNode {
                block,
                height,
                target,
                depth,
                recent_timestamps: window,
                children: Vec::new(),
                diff: None,
            },
        );
        if let Some(parent) = self.block_map.get_mut(&parent_id) {
            parent.children.push(id);
        }
        id
    }

    // ========================================================================
    // ENTRY POINT
    // ========================================================================

    /// Accept a candidate block, switching the canonical chain if the block
    /// lands on a sufficiently heavier fork.
    ///
    /// `now` is the caller's wall-clock reading; the state machine itself
    /// never consults a clock.
    pub fn accept_block(&mut self, block: Block, now: Timestamp) -> ConsensusResult<AcceptedBlock> {
        self.check_destiny(&block)?;
        self.validate_header(&block, now)?;

        let encoded_len = block.encoded_len();
        if encoded_len > BLOCK_SIZE_LIMIT {
            return Err(ConsensusError::BlockTooLarge {
                size: encoded_len,
                limit: BLOCK_SIZE_LIMIT,
            });
        }

        let id = self.add_to_tree(block);

        let mut outcome = AcceptedBlock::default();
        let mut change = ConsensusChange::default();
        if self.heavier_fork(&id) {
            debug!(
                "Block {} lands on a branch heavier than tip {}; switching",
                id, self.current_block_id
            );
            let fork = self.fork_blockchain(id)?;
            outcome = AcceptedBlock {
                rewound_blocks: fork.rewound,
                applied_blocks: fork.applied,
                output_diffs: fork.diffs,
            };
            change = fork.change;
        }

        info!(
            "✅ Accepted block {}; tip {} at height {}",
            id, self.current_block_id, self.height()
        );
        self.publish(change);

        #[cfg(debug_assertions)]
        self.assert_current_path_connected();

        Ok(outcome)
    }

    // ========================================================================
    // DEBUG ASSERTIONS
    // ========================================================================

    /// Debug-build check: the canonical path is dense and parent-linked from
    /// tip to genesis.
    #[cfg(debug_assertions)]
    pub(crate) fn assert_current_path_connected(&self) {
        let tip_height = self.height();
        assert_eq!(
            self.current_path.len() as u64,
            tip_height + 1,
            "canonical path is not dense"
        );

        let mut cursor = self.current_block_id;
        for height in (0..=tip_height).rev() {
            assert_eq!(
                self.current_path.get(&height),
                Some(&cursor),
                "canonical path entry at height {height} does not match parent links"
            );
            cursor = self.node(&cursor).block.parent_id;
        }
        assert!(cursor.is_zero(), "canonical path does not terminate at genesis");
    }
}
