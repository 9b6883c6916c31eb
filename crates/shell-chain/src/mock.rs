//! Deterministic in-memory chain used by tests across the workspace. It
//! implements the full `ChainAdapter` surface with simplified but
//! order-stable rules, so pipeline behavior is reproducible.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use shell_core::constants::MAX_MONEY;
use shell_core::error::ShellError;
use shell_core::transaction::Transaction;
use shell_core::types::{BlockHeight, Hash256, MinorUnits, OutPoint, Timestamp};
use shell_wire::{tx_hash, tx_stripped_size};

use crate::adapter::{ChainAdapter, SequenceLock, UtxoEntry, UtxoView};
use crate::cache::{HashCache, SigCache};

/// Blocks a coinbase output must age before it is spendable.
pub const COINBASE_MATURITY: BlockHeight = 100;

const SEQUENCE_DISABLE_FLAG: u32 = 1 << 31;
const SEQUENCE_TIME_TYPE_FLAG: u32 = 1 << 22;
const SEQUENCE_LOCK_MASK: u32 = 0xffff;
const SEQUENCE_TIME_GRANULARITY: u32 = 9;

struct MockChainState {
    utxos: HashMap<OutPoint, UtxoEntry>,
    spent: HashSet<OutPoint>,
    height: BlockHeight,
    median_time_past: Timestamp,
    active_deployments: HashSet<u32>,
    invalid_scripts: HashSet<Hash256>,
}

/// In-memory `ChainAdapter` for tests.
pub struct MockChain {
    state: RwLock<MockChainState>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    /// A chain at height 1000 with segwit and taproot active.
    pub fn new() -> Self {
        let mut active = HashSet::new();
        active.insert(crate::adapter::DEPLOYMENT_SEGWIT);
        active.insert(crate::adapter::DEPLOYMENT_TAPROOT);
        Self {
            state: RwLock::new(MockChainState {
                utxos: HashMap::new(),
                spent: HashSet::new(),
                height: 1_000,
                median_time_past: 1_900_000_000,
                active_deployments: active,
                invalid_scripts: HashSet::new(),
            }),
        }
    }

    pub fn add_utxo(
        &self,
        out: OutPoint,
        value: MinorUnits,
        pk_script: Vec<u8>,
        height: BlockHeight,
        is_coinbase: bool,
    ) {
        let mut state = self.state.write().expect("mock chain poisoned");
        state
            .utxos
            .insert(out, UtxoEntry::new(value, pk_script, height, is_coinbase));
        state.spent.remove(&out);
    }

    pub fn set_height(&self, height: BlockHeight) {
        self.state.write().expect("mock chain poisoned").height = height;
    }

    pub fn set_median_time_past(&self, mtp: Timestamp) {
        self.state.write().expect("mock chain poisoned").median_time_past = mtp;
    }

    pub fn set_deployment(&self, deployment_id: u32, active: bool) {
        let mut state = self.state.write().expect("mock chain poisoned");
        if active {
            state.active_deployments.insert(deployment_id);
        } else {
            state.active_deployments.remove(&deployment_id);
        }
    }

    /// Make script validation fail for one transaction.
    pub fn mark_script_invalid(&self, txid: Hash256) {
        self.state
            .write()
            .expect("mock chain poisoned")
            .invalid_scripts
            .insert(txid);
    }

    /// Record a transaction as confirmed: its inputs become spent and its
    /// outputs enter the UTXO set at `height`.
    pub fn connect_transaction(&self, tx: &Transaction, height: BlockHeight) {
        let txid = tx_hash(tx);
        let mut state = self.state.write().expect("mock chain poisoned");
        for input in &tx.inputs {
            if !input.prev_out.is_null() {
                state.spent.insert(input.prev_out);
            }
        }
        let is_coinbase = tx.is_coinbase_shape();
        for (index, out) in tx.outputs.iter().enumerate() {
            state.utxos.insert(
                OutPoint::new(txid, index as u32),
                UtxoEntry::new(out.value, out.pk_script.clone(), height, is_coinbase),
            );
        }
        if height > state.height {
            state.height = height;
        }
    }
}

impl ChainAdapter for MockChain {
    fn best_height(&self) -> BlockHeight {
        self.state.read().expect("mock chain poisoned").height
    }

    fn median_time_past(&self) -> Timestamp {
        self.state
            .read()
            .expect("mock chain poisoned")
            .median_time_past
    }

    fn fetch_utxo_view(&self, tx: &Transaction) -> Result<UtxoView, ShellError> {
        let state = self.state.read().expect("mock chain poisoned");
        let mut view = UtxoView::new();

        for input in &tx.inputs {
            if let Some(entry) = state.utxos.get(&input.prev_out) {
                let mut entry = entry.clone();
                if state.spent.contains(&input.prev_out) {
                    entry.spend();
                }
                view.add_entry(input.prev_out, entry);
            }
        }

        // The transaction's own output slots, so callers can detect a
        // duplicate of an already-confirmed transaction.
        let txid = tx_hash(tx);
        for index in 0..tx.outputs.len() as u32 {
            let out = OutPoint::new(txid, index);
            if let Some(entry) = state.utxos.get(&out) {
                let mut entry = entry.clone();
                if state.spent.contains(&out) {
                    entry.spend();
                }
                view.add_entry(out, entry);
            }
        }
        Ok(view)
    }

    fn check_transaction_sanity(&self, tx: &Transaction) -> Result<(), ShellError> {
        if tx.inputs.is_empty() {
            return Err(ShellError::Invalid("transaction has no inputs".into()));
        }
        if tx.outputs.is_empty() {
            return Err(ShellError::Invalid("transaction has no outputs".into()));
        }

        let mut total: MinorUnits = 0;
        for out in &tx.outputs {
            if out.value < 0 {
                return Err(ShellError::Invalid("negative output value".into()));
            }
            if out.value > MAX_MONEY {
                return Err(ShellError::Invalid("output value above maximum".into()));
            }
            total = total.saturating_add(out.value);
            if total > MAX_MONEY {
                return Err(ShellError::Invalid("total output value above maximum".into()));
            }
        }

        let mut seen = HashSet::new();
        for input in &tx.inputs {
            if !tx.is_coinbase_shape() && input.prev_out.is_null() {
                return Err(ShellError::Invalid("null previous outpoint".into()));
            }
            if !seen.insert(input.prev_out) {
                return Err(ShellError::Invalid("duplicate transaction input".into()));
            }
        }

        if tx.is_coinbase_shape() {
            let len = tx.inputs[0].sig_script.len();
            if !(2..=100).contains(&len) {
                return Err(ShellError::Invalid("bad coinbase script length".into()));
            }
        }

        if tx_stripped_size(tx) == 0 {
            return Err(ShellError::Internal("empty encoding".into()));
        }
        Ok(())
    }

    fn is_coinbase(&self, tx: &Transaction) -> bool {
        tx.is_coinbase_shape()
    }

    fn check_transaction_inputs(
        &self,
        tx: &Transaction,
        next_height: BlockHeight,
        view: &UtxoView,
    ) -> Result<MinorUnits, ShellError> {
        let mut total_in: MinorUnits = 0;
        for input in &tx.inputs {
            let entry = view.entry(&input.prev_out).ok_or_else(|| {
                ShellError::Invalid(format!("missing input {}", input.prev_out))
            })?;
            if entry.is_spent() {
                return Err(ShellError::Invalid(format!(
                    "input {} already spent",
                    input.prev_out
                )));
            }
            if entry.is_coinbase && next_height - entry.height < COINBASE_MATURITY {
                return Err(ShellError::Invalid(format!(
                    "immature coinbase spend of {}",
                    input.prev_out
                )));
            }
            total_in = total_in.saturating_add(entry.value);
        }

        let total_out = tx.total_output_value();
        if total_out > total_in {
            return Err(ShellError::Invalid(format!(
                "spends {total_out} but only {total_in} available"
            )));
        }
        Ok(total_in - total_out)
    }

    fn calc_sequence_lock(
        &self,
        tx: &Transaction,
        view: &UtxoView,
    ) -> Result<SequenceLock, ShellError> {
        let mut lock = SequenceLock::unconstrained();
        if tx.version < 2 {
            return Ok(lock);
        }

        let state = self.state.read().expect("mock chain poisoned");
        for input in &tx.inputs {
            if input.sequence & SEQUENCE_DISABLE_FLAG != 0 {
                continue;
            }
            let entry = view.entry(&input.prev_out).ok_or_else(|| {
                ShellError::Invalid(format!("missing input {}", input.prev_out))
            })?;
            let utxo_height = entry.height.min(state.height);
            let locked = (input.sequence & SEQUENCE_LOCK_MASK) as i64;

            if input.sequence & SEQUENCE_TIME_TYPE_FLAG != 0 {
                // Approximate the past median time at the UTXO's height with
                // one block per 600 seconds.
                let age_blocks = (state.height - utxo_height).max(0) as i64;
                let utxo_time = state.median_time_past - age_blocks * 600;
                let min_time = utxo_time + (locked << SEQUENCE_TIME_GRANULARITY) - 1;
                lock.min_time = lock.min_time.max(min_time);
            } else {
                let min_height = utxo_height + locked as BlockHeight - 1;
                lock.min_height = lock.min_height.max(min_height);
            }
        }
        Ok(lock)
    }

    fn get_sig_op_cost(
        &self,
        tx: &Transaction,
        is_coinbase: bool,
        _view: &UtxoView,
        _bip16_active: bool,
        segwit_active: bool,
    ) -> Result<u32, ShellError> {
        if is_coinbase {
            return Ok(0);
        }
        let per_input: u32 = if segwit_active { 4 } else { 1 };
        Ok(tx.inputs.len() as u32 * per_input)
    }

    fn validate_transaction_scripts(
        &self,
        tx: &Transaction,
        _view: &UtxoView,
        _flags: u32,
        sig_cache: &SigCache,
        hash_cache: &HashCache,
    ) -> Result<(), ShellError> {
        let txid = tx_hash(tx);
        let state = self.state.read().expect("mock chain poisoned");
        if state.invalid_scripts.contains(&txid) {
            return Err(ShellError::Invalid("script validation failed".into()));
        }
        sig_cache.insert(txid);
        hash_cache.insert(txid);
        Ok(())
    }

    fn is_deployment_active(&self, deployment_id: u32) -> Result<bool, ShellError> {
        Ok(self
            .state
            .read()
            .expect("mock chain poisoned")
            .active_deployments
            .contains(&deployment_id))
    }
}
