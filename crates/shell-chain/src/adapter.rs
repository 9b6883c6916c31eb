use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use shell_core::error::ShellError;
use shell_core::transaction::Transaction;
use shell_core::types::{BlockHeight, Hash256, MinorUnits, OutPoint, Timestamp};

use crate::cache::{HashCache, SigCache};

/// Deployment ids the core queries.
pub const DEPLOYMENT_SEGWIT: u32 = 0;
pub const DEPLOYMENT_TAPROOT: u32 = 1;

// ── UTXO view ────────────────────────────────────────────────────────────────

/// One unspent (or recently spent) output as seen by the chain.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub value: MinorUnits,
    pub pk_script: Vec<u8>,
    /// Height of the block containing the output.
    pub height: BlockHeight,
    pub is_coinbase: bool,
    spent: bool,
}

impl UtxoEntry {
    pub fn new(value: MinorUnits, pk_script: Vec<u8>, height: BlockHeight, is_coinbase: bool) -> Self {
        Self {
            value,
            pk_script,
            height,
            is_coinbase,
            spent: false,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    pub fn spend(&mut self) {
        self.spent = true;
    }
}

/// A point-in-time view over the outpoints one transaction references:
/// its inputs' previous outputs plus its own output slots (so duplicate
/// submissions of an already-confirmed transaction are detectable).
#[derive(Clone, Debug, Default)]
pub struct UtxoView {
    entries: HashMap<OutPoint, UtxoEntry>,
}

impl UtxoView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, out: &OutPoint) -> Option<&UtxoEntry> {
        self.entries.get(out)
    }

    pub fn add_entry(&mut self, out: OutPoint, entry: UtxoEntry) {
        self.entries.insert(out, entry);
    }

    pub fn remove_entry(&mut self, out: &OutPoint) {
        self.entries.remove(out);
    }

    /// Splice a pool transaction's outputs into the view so children can
    /// resolve unconfirmed parents. Pool outputs carry the sentinel height
    /// `UNCONFIRMED_HEIGHT`.
    pub fn add_transaction_outputs(&mut self, txid: Hash256, tx: &Transaction) {
        for (index, out) in tx.outputs.iter().enumerate() {
            self.add_entry(
                OutPoint::new(txid, index as u32),
                UtxoEntry::new(out.value, out.pk_script.clone(), UNCONFIRMED_HEIGHT, false),
            );
        }
    }
}

/// Sentinel height for outputs of still-unconfirmed pool transactions.
pub const UNCONFIRMED_HEIGHT: BlockHeight = 0x7fff_ffff;

// ── Sequence locks ───────────────────────────────────────────────────────────

/// Relative-timelock constraint computed from a transaction's sequence
/// numbers and the ages of its inputs. `-1` means unconstrained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequenceLock {
    pub min_height: BlockHeight,
    pub min_time: Timestamp,
}

impl SequenceLock {
    pub fn unconstrained() -> Self {
        Self {
            min_height: -1,
            min_time: -1,
        }
    }
}

// ── Chain adapter ────────────────────────────────────────────────────────────

/// The capability bundle the host chain exposes to the core. Implementations
/// must be callable while the mempool lock is held and therefore must not
/// call back into the pool.
pub trait ChainAdapter: Send + Sync {
    fn best_height(&self) -> BlockHeight;

    fn median_time_past(&self) -> Timestamp;

    /// Fetch the UTXO entries for the transaction's inputs and its own
    /// output slots.
    fn fetch_utxo_view(&self, tx: &Transaction) -> Result<UtxoView, ShellError>;

    /// Context-free consensus checks: version, sizes, value ranges,
    /// coinbase shape.
    fn check_transaction_sanity(&self, tx: &Transaction) -> Result<(), ShellError>;

    fn is_coinbase(&self, tx: &Transaction) -> bool;

    /// Contextual input checks against the view; returns the transaction
    /// fee on success.
    fn check_transaction_inputs(
        &self,
        tx: &Transaction,
        next_height: BlockHeight,
        view: &UtxoView,
    ) -> Result<MinorUnits, ShellError>;

    fn calc_sequence_lock(
        &self,
        tx: &Transaction,
        view: &UtxoView,
    ) -> Result<SequenceLock, ShellError>;

    /// Whether a computed sequence lock has matured at the given height and
    /// median time past.
    fn sequence_lock_active(
        &self,
        lock: &SequenceLock,
        height: BlockHeight,
        median_time_past: Timestamp,
    ) -> bool {
        lock.min_height < height && lock.min_time < median_time_past
    }

    fn get_sig_op_cost(
        &self,
        tx: &Transaction,
        is_coinbase: bool,
        view: &UtxoView,
        bip16_active: bool,
        segwit_active: bool,
    ) -> Result<u32, ShellError>;

    /// Full script validation; may consult the shared signature cache.
    fn validate_transaction_scripts(
        &self,
        tx: &Transaction,
        view: &UtxoView,
        flags: u32,
        sig_cache: &SigCache,
        hash_cache: &HashCache,
    ) -> Result<(), ShellError>;

    fn is_deployment_active(&self, deployment_id: u32) -> Result<bool, ShellError>;
}

// ── Secondary hooks ──────────────────────────────────────────────────────────

/// Optional unconfirmed-transaction index kept by the host.
pub trait AddressIndex: Send + Sync {
    fn add_unconfirmed_tx(&self, tx: &Transaction, view: &UtxoView);
    fn remove_unconfirmed_tx(&self, txid: &Hash256);
}

/// What the fee estimator sees for each admitted transaction.
#[derive(Clone, Debug)]
pub struct ObservedTx {
    pub txid: Hash256,
    pub fee: MinorUnits,
    pub vsize: usize,
    pub height: BlockHeight,
}

/// Optional fee estimation hook.
pub trait FeeEstimator: Send + Sync {
    fn observe_transaction(&self, observed: &ObservedTx);
}
