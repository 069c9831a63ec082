//! Shared test harness: deterministic clock, block mining, engine setup.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use lib_consensus::engine::Clock;
use lib_consensus::{Block, ConsensusEngine, GenesisConfig, Target};
use lib_types::{Address, BlockHash, BlockHeight, Currency, OutputId, Timestamp};
use lib_utxo::{
    transaction_merkle_root, NativeExecutor, Output, OutputDiff, Transaction, TransactionDiff,
    TransactionExecutor, UtxoLedger, UtxoResult,
};

/// Timestamp of the test genesis block.
pub const GENESIS_TIMESTAMP: Timestamp = 1_000;

/// A wall-clock time at which every test timestamp is comfortably in the
/// past.
pub const FAR_FUTURE_NOW: Timestamp = 1_000_000;

/// Settable clock for deterministic future-block tests.
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicU64::new(now),
        })
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// A threshold slightly below the root target. Child targets drift at most
/// 0.1% per block, so for the short chains tests build, any id at or below
/// this floor also satisfies the real target of every block.
pub fn test_target_floor() -> Target {
    let mut bytes = [0u8; 32];
    bytes[2] = 0xFB;
    Target::new(bytes)
}

/// Build a block and grind its nonce until it clears the test target floor.
pub fn mine_block(
    parent_id: BlockHash,
    timestamp: Timestamp,
    miner_address: Address,
    transactions: Vec<Transaction>,
) -> Block {
    let merkle_root = transaction_merkle_root(&transactions);
    let mut block = Block {
        parent_id,
        timestamp,
        nonce: 0,
        miner_address,
        merkle_root,
        transactions,
    };
    let floor = test_target_floor();
    while !floor.meets(block.id()) {
        block.nonce += 1;
    }
    block
}

/// An empty mined block.
pub fn empty_block(parent_id: BlockHash, timestamp: Timestamp) -> Block {
    mine_block(parent_id, timestamp, Address::zero(), Vec::new())
}

/// Engine over a manual clock, genesis at `GENESIS_TIMESTAMP`.
pub fn test_engine(
    now: Timestamp,
    allocation: Vec<(OutputId, Output)>,
) -> (ConsensusEngine, Arc<ManualClock>) {
    test_engine_with(now, allocation, Box::new(NativeExecutor::new()))
}

/// Engine over a manual clock and an explicit transaction executor.
pub fn test_engine_with(
    now: Timestamp,
    allocation: Vec<(OutputId, Output)>,
    executor: Box<dyn TransactionExecutor>,
) -> (ConsensusEngine, Arc<ManualClock>) {
    let clock = ManualClock::new(now);
    let config = GenesisConfig::new(GENESIS_TIMESTAMP).with_allocation(allocation);
    let engine = ConsensusEngine::with_clock(config, executor, clock.clone());
    (engine, clock)
}

/// An allocation of one premined output, returned with its id.
pub fn premined_output(value: u64) -> (OutputId, Output) {
    (
        OutputId::new([0xAA; 32]),
        Output::new(value, Address::new([0xBB; 32])),
    )
}

/// A transfer spending `input` into one output plus a fee.
pub fn spend(input: OutputId, value: u64, fee: u64) -> Transaction {
    Transaction {
        inputs: vec![input],
        outputs: vec![Output::new(value, Address::new([0xCC; 32]))],
        miner_fees: vec![fee],
    }
}

/// Deterministic id of the contract payout `RecordingExecutor` mints for the
/// block at `height`.
pub fn maintenance_output_id(height: BlockHeight) -> OutputId {
    OutputId::new(lib_crypto::hash_blake3_multiple(&[
        b"contract-maintenance",
        &height.to_le_bytes(),
    ]))
}

/// Value of every payout minted by `RecordingExecutor`.
pub const MAINTENANCE_PAYOUT: Currency = 7;

/// Shared view into a [`RecordingExecutor`]'s collaborator-hook activity.
#[derive(Clone, Default)]
pub struct MaintenanceLog {
    inner: Arc<Mutex<MaintenanceLogInner>>,
}

#[derive(Default)]
struct MaintenanceLogInner {
    applied_heights: Vec<BlockHeight>,
    inverted: usize,
    pool_cleanings: usize,
}

impl MaintenanceLog {
    /// Heights passed to `apply_contract_maintenance`, in call order
    pub fn applied_heights(&self) -> Vec<BlockHeight> {
        self.inner.lock().unwrap().applied_heights.clone()
    }

    /// Number of `invert_contract_maintenance` calls
    pub fn inverted(&self) -> usize {
        self.inner.lock().unwrap().inverted
    }

    /// Number of `clean_transaction_pool` calls
    pub fn pool_cleanings(&self) -> usize {
        self.inner.lock().unwrap().pool_cleanings
    }
}

/// Executor that delegates transfers to [`NativeExecutor`] but gives the
/// contract-maintenance hooks observable behavior: each integrated block
/// mints one payout output, each inversion removes it again, and every hook
/// call is recorded in a shared [`MaintenanceLog`].
pub struct RecordingExecutor {
    inner: NativeExecutor,
    log: MaintenanceLog,
    open_payouts: Vec<(OutputId, Output)>,
}

impl RecordingExecutor {
    pub fn new() -> (Self, MaintenanceLog) {
        let log = MaintenanceLog::default();
        let executor = Self {
            inner: NativeExecutor::new(),
            log: log.clone(),
            open_payouts: Vec::new(),
        };
        (executor, log)
    }
}

impl TransactionExecutor for RecordingExecutor {
    fn validate_transaction(&self, ledger: &UtxoLedger, txn: &Transaction) -> UtxoResult<()> {
        self.inner.validate_transaction(ledger, txn)
    }

    fn apply_transaction(&mut self, ledger: &mut UtxoLedger, txn: &Transaction) -> TransactionDiff {
        self.inner.apply_transaction(ledger, txn)
    }

    fn invert_transaction(&mut self, ledger: &mut UtxoLedger, txn: &Transaction) -> Vec<OutputDiff> {
        self.inner.invert_transaction(ledger, txn)
    }

    fn apply_contract_maintenance(
        &mut self,
        ledger: &mut UtxoLedger,
        height: BlockHeight,
        changes: &mut TransactionDiff,
    ) -> Vec<OutputDiff> {
        self.log.inner.lock().unwrap().applied_heights.push(height);

        let id = maintenance_output_id(height);
        let output = Output::new(MAINTENANCE_PAYOUT, Address::new([0xDD; 32]));
        ledger.insert(id, output);
        self.open_payouts.push((id, output));

        let diff = OutputDiff {
            new: true,
            id,
            output,
        };
        changes.output_diffs.push(diff.clone());
        vec![diff]
    }

    fn invert_contract_maintenance(&mut self, ledger: &mut UtxoLedger) -> Vec<OutputDiff> {
        self.log.inner.lock().unwrap().inverted += 1;

        let (id, output) = self
            .open_payouts
            .pop()
            .expect("maintenance inverted without a matching apply");
        ledger.remove(&id);
        vec![OutputDiff {
            new: false,
            id,
            output,
        }]
    }

    fn calculate_coinbase(&self, height: BlockHeight) -> Currency {
        self.inner.calculate_coinbase(height)
    }

    fn clean_transaction_pool(&mut self) {
        self.log.inner.lock().unwrap().pool_cleanings += 1;
    }

    fn state_digest(&self, hasher: &mut blake3::Hasher) {
        self.inner.state_digest(hasher);
        hasher.update(&(self.open_payouts.len() as u64).to_le_bytes());
        for (id, output) in &self.open_payouts {
            hasher.update(id.as_bytes());
            hasher.update(&output.value.to_le_bytes());
        }
    }
}
