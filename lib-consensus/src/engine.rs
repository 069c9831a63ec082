//! Consensus engine wrapper
//!
//! Wraps the single-writer [`State`] in a mutex and owns the two pieces of
//! ambient machinery the state machine itself must not touch: the wall
//! clock, and the deferred retry timer for blocks that arrive from the
//! future. Every public call acquires the lock for its full duration and
//! never suspends while holding it.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use lib_types::{BlockHash, BlockHeight, OutputId, Timestamp};
use lib_utxo::{Output, TransactionExecutor};

use crate::block::Block;
use crate::error::{ConsensusError, ConsensusResult};
use crate::events::ConsensusChange;
use crate::params::FUTURE_THRESHOLD;
use crate::state::{AcceptedBlock, GenesisConfig, State};
use crate::target::Target;

/// Wall-clock source.
///
/// The state machine takes `now` as a parameter; the engine reads it from
/// here so tests can drive time explicitly.
pub trait Clock: Send + Sync + 'static {
    /// Seconds since the UNIX epoch
    fn now(&self) -> Timestamp;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0)
    }
}

/// Thread-safe handle to the consensus state machine.
#[derive(Clone)]
pub struct ConsensusEngine {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl ConsensusEngine {
    /// Create an engine over the system clock.
    pub fn new(config: GenesisConfig, executor: Box<dyn TransactionExecutor>) -> Self {
        Self::with_clock(config, executor, Arc::new(SystemClock))
    }

    /// Create an engine with an explicit clock (tests drive this).
    pub fn with_clock(
        config: GenesisConfig,
        executor: Box<dyn TransactionExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::new(config, executor))),
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("consensus state lock poisoned")
    }

    /// Submit a block for acceptance.
    ///
    /// A `FutureBlock` result additionally schedules a best-effort deferred
    /// resubmission once the block's clock skew has decayed; the timer holds
    /// nothing but the block bytes and is lost if the process dies (peers
    /// will re-advertise).
    pub fn accept_block(&self, block: Block) -> ConsensusResult<AcceptedBlock> {
        let now = self.clock.now();

        // Only clone for the retry path when the timestamp is actually
        // skewed; the common case pays nothing.
        let deferred = if block.timestamp > now + FUTURE_THRESHOLD {
            Some(block.clone())
        } else {
            None
        };

        let result = self.lock().accept_block(block, now);

        if let (Err(ConsensusError::FutureBlock { retry_after }), Some(block)) = (&result, deferred)
        {
            self.schedule_retry(block, *retry_after);
        }

        result
    }

    /// Spawn the deferred resubmission task for a future block.
    fn schedule_retry(&self, block: Block, retry_after: Timestamp) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(
                "No async runtime; dropping deferred retry for future block {}",
                block.id()
            );
            return;
        };

        debug!("Scheduling retry of block {} in {}s", block.id(), retry_after);
        let engine = self.clone();
        runtime.spawn(async move {
            tokio::time::sleep(Duration::from_secs(retry_after)).await;
            let id = block.id();
            match engine.accept_block(block) {
                Ok(_) => debug!("Deferred block {} accepted", id),
                Err(err) => debug!("Deferred block {} still rejected: {}", id, err),
            }
        });
    }

    /// Register a subscriber stream of committed [`ConsensusChange`]s.
    pub fn subscribe(&self) -> UnboundedReceiver<ConsensusChange> {
        self.lock().subscribe()
    }

    /// Remove and return the orphans staged under `parent_id` for replay.
    pub fn take_orphans(&self, parent_id: &BlockHash) -> Vec<Block> {
        self.lock().take_orphans(parent_id)
    }

    /// The canonical tip block
    pub fn current_block(&self) -> Block {
        self.lock().current_block().clone()
    }

    /// Height of the canonical tip
    pub fn height(&self) -> BlockHeight {
        self.lock().height()
    }

    /// Cumulative weight of the canonical chain
    pub fn depth(&self) -> Target {
        self.lock().depth()
    }

    /// Proof-of-work threshold for children of the canonical tip
    pub fn current_target(&self) -> Target {
        self.lock().current_target()
    }

    /// Id of the genesis block
    pub fn genesis_id(&self) -> BlockHash {
        self.lock().genesis_id()
    }

    /// Look up an unspent output
    pub fn output(&self, id: &OutputId) -> Option<Output> {
        self.lock().output(id).copied()
    }

    /// The canonical block at `height`
    pub fn block_at_height(&self, height: BlockHeight) -> Option<Block> {
        self.lock().block_at_height(height).cloned()
    }

    /// Deterministic digest of committed consensus state
    pub fn state_hash(&self) -> [u8; 32] {
        self.lock().state_hash()
    }
}
