//! Unspent-output ledger
//!
//! The single-owner UTXO set maintained in lock-step with the canonical
//! chain. All mutations flow through the consensus engine; no other component
//! writes here.

use std::collections::HashMap;

use lib_types::OutputId;

use crate::types::Output;

/// In-memory UTXO set, id → output.
#[derive(Debug, Clone, Default)]
pub struct UtxoLedger {
    unspent: HashMap<OutputId, Output>,
}

impl UtxoLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an unspent output
    pub fn output(&self, id: &OutputId) -> Option<&Output> {
        self.unspent.get(id)
    }

    /// Check whether `id` is unspent
    pub fn contains(&self, id: &OutputId) -> bool {
        self.unspent.contains_key(id)
    }

    /// Record a newly created output
    pub fn insert(&mut self, id: OutputId, output: Output) {
        self.unspent.insert(id, output);
    }

    /// Remove an output, returning its contents if it existed
    pub fn remove(&mut self, id: &OutputId) -> Option<Output> {
        self.unspent.remove(id)
    }

    /// Number of unspent outputs
    pub fn len(&self) -> usize {
        self.unspent.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.unspent.is_empty()
    }

    /// Feed the ledger's contents into a state digest.
    ///
    /// Iterates in sorted id order so the digest is independent of map
    /// internals.
    pub fn digest(&self, hasher: &mut blake3::Hasher) {
        let mut ids: Vec<&OutputId> = self.unspent.keys().collect();
        ids.sort();
        hasher.update(&(ids.len() as u64).to_le_bytes());
        for id in ids {
            let output = &self.unspent[id];
            hasher.update(id.as_bytes());
            hasher.update(&output.value.to_le_bytes());
            hasher.update(output.spend_hash.as_bytes());
        }
    }
}
