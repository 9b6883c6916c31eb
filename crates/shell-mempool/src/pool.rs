use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use shell_chain::adapter::UNCONFIRMED_HEIGHT;
use shell_chain::{
    AddressIndex, ChainAdapter, FeeEstimator, HashCache, ObservedTx, SigCache, UtxoView,
    DEPLOYMENT_SEGWIT,
};
use shell_core::constants::{FREE_TX_DECAY_SECS, MIN_HIGH_PRIORITY, MIN_STANDARD_TX_SIZE};
use shell_core::error::ShellError;
use shell_core::policy::Policy;
use shell_core::transaction::Transaction;
use shell_core::types::{BlockHeight, Hash256, MinorUnits, OutPoint, Timestamp};
use shell_fees::calculate_fee;
use shell_script::extract_operations;
use shell_wire::{tx_hash, tx_stripped_size, tx_vsize};

use crate::rbf;
use crate::standard::{check_input_standard, check_transaction_standard};

/// Opaque source tag recorded with orphans (typically a peer id).
pub type Tag = u64;

/// Script-verification flags handed to the chain adapter for relay-level
/// validation. The adapter interprets them.
pub const STANDARD_SCRIPT_VERIFY_FLAGS: u32 = 1;

/// A transaction resident in the main pool, with its admission metadata.
#[derive(Clone, Debug)]
pub struct TxDesc {
    pub tx: Arc<Transaction>,
    pub txid: Hash256,
    /// Wall-clock admission time.
    pub added: Timestamp,
    /// Best chain height at admission.
    pub height: BlockHeight,
    pub fee: MinorUnits,
    /// Fee in minor units per 1000 virtual bytes.
    pub fee_per_kvb: MinorUnits,
    pub starting_priority: f64,
}

#[derive(Clone, Debug)]
pub(crate) struct OrphanTx {
    pub tx: Arc<Transaction>,
    pub txid: Hash256,
    pub tag: Tag,
    pub expiration: Timestamp,
}

/// Everything guarded by the pool's writer lock.
pub(crate) struct PoolInner {
    pub pool: HashMap<Hash256, Arc<TxDesc>>,
    /// Consumed outpoint → the pool transaction consuming it.
    pub outpoints: HashMap<OutPoint, Hash256>,
    pub orphans: HashMap<Hash256, OrphanTx>,
    /// Missing parent outpoint → orphans waiting on it.
    pub orphans_by_prev: HashMap<OutPoint, HashSet<Hash256>>,
    /// Exponentially decaying byte counter for zero-fee traffic.
    pub penny_total: f64,
    pub last_penny_time: Timestamp,
    pub next_orphan_scan: Timestamp,
}

/// Pool construction parameters.
pub struct MempoolConfig {
    pub policy: Policy,
    pub chain: Arc<dyn ChainAdapter>,
    pub address_index: Option<Arc<dyn AddressIndex>>,
    pub fee_estimator: Option<Arc<dyn FeeEstimator>>,
}

/// Outcome of submitting one transaction.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The transaction and any orphans it unblocked, in admission order.
    Accepted(Vec<Arc<TxDesc>>),
    /// Missing parents; the transaction entered the orphan pool.
    Orphaned(Vec<Hash256>),
}

enum AcceptOutcome {
    Accepted(Arc<TxDesc>),
    MissingParents(Vec<Hash256>),
}

/// The transaction memory pool.
pub struct TxPool {
    cfg: MempoolConfig,
    inner: RwLock<PoolInner>,
    last_updated: AtomicI64,
    sig_cache: SigCache,
    hash_cache: HashCache,
}

pub(crate) fn unix_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl TxPool {
    pub fn new(cfg: MempoolConfig) -> Self {
        Self {
            cfg,
            inner: RwLock::new(PoolInner {
                pool: HashMap::new(),
                outpoints: HashMap::new(),
                orphans: HashMap::new(),
                orphans_by_prev: HashMap::new(),
                penny_total: 0.0,
                last_penny_time: unix_now(),
                next_orphan_scan: unix_now(),
            }),
            last_updated: AtomicI64::new(0),
            sig_cache: SigCache::new(),
            hash_cache: HashCache::new(),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.cfg.policy
    }

    pub(crate) fn touch(&self) {
        self.last_updated.store(unix_now(), Ordering::SeqCst);
    }

    pub(crate) fn inner_read(&self) -> RwLockReadGuard<'_, PoolInner> {
        self.inner.read().expect("mempool lock poisoned")
    }

    pub(crate) fn inner_write(&self) -> RwLockWriteGuard<'_, PoolInner> {
        self.inner.write().expect("mempool lock poisoned")
    }

    /// Re-run a stored orphan through the pipeline. Duplicate-orphan
    /// rejection is off: the transaction is, by construction, already in the
    /// orphan pool.
    pub(crate) fn maybe_accept_for_orphan(
        &self,
        inner: &mut PoolInner,
        tx: Arc<Transaction>,
        rate_limit: bool,
    ) -> Result<Option<Arc<TxDesc>>, ShellError> {
        match self.maybe_accept(inner, tx, true, rate_limit, false)? {
            AcceptOutcome::Accepted(desc) => Ok(Some(desc)),
            AcceptOutcome::MissingParents(_) => Ok(None),
        }
    }

    /// Wall-clock time of the last pool mutation. An eventual-consistency
    /// hint, not a barrier.
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated.load(Ordering::SeqCst)
    }

    // ── Submission ───────────────────────────────────────────────────────────

    /// Run a transaction through the acceptance pipeline, then promote any
    /// orphans it unblocked. `is_new` is false for re-org reinjection.
    pub fn process_transaction(
        &self,
        tx: Arc<Transaction>,
        is_new: bool,
        rate_limit: bool,
        allow_orphan: bool,
        tag: Tag,
    ) -> Result<ProcessOutcome, ShellError> {
        let mut inner = self.inner.write().expect("mempool lock poisoned");
        match self.maybe_accept(&mut inner, tx.clone(), is_new, rate_limit, true)? {
            AcceptOutcome::Accepted(desc) => {
                let mut accepted = vec![desc.clone()];
                accepted.extend(self.process_orphans_locked(&mut inner, desc, rate_limit));
                Ok(ProcessOutcome::Accepted(accepted))
            }
            AcceptOutcome::MissingParents(parents) => {
                if !allow_orphan {
                    return Err(ShellError::Orphan { parents });
                }
                self.add_orphan_locked(&mut inner, tx, tag)?;
                Ok(ProcessOutcome::Orphaned(parents))
            }
        }
    }

    /// The 18-step acceptance pipeline. Straight-line code under the writer
    /// lock; any failure carries a protocol reject code.
    fn maybe_accept(
        &self,
        inner: &mut PoolInner,
        tx: Arc<Transaction>,
        is_new: bool,
        rate_limit: bool,
        reject_dup_orphans: bool,
    ) -> Result<AcceptOutcome, ShellError> {
        let chain = &self.cfg.chain;
        let policy = &self.cfg.policy;
        let txid = tx_hash(&tx);

        // 1. Witness data requires the segwit deployment.
        if tx.has_witness() && !chain.is_deployment_active(DEPLOYMENT_SEGWIT)? {
            return Err(ShellError::Nonstandard(
                "witness transaction before segwit activation".into(),
            ));
        }

        // 2. Duplicate detection.
        if inner.pool.contains_key(&txid)
            || (reject_dup_orphans && inner.orphans.contains_key(&txid))
        {
            return Err(ShellError::Duplicate(txid.to_hex()));
        }

        // 3. Undersized transactions cannot be standard.
        let stripped_size = tx_stripped_size(&tx);
        if stripped_size < MIN_STANDARD_TX_SIZE {
            return Err(ShellError::Nonstandard(format!(
                "stripped size {stripped_size} below minimum {MIN_STANDARD_TX_SIZE}"
            )));
        }

        // 4. Context-free consensus sanity.
        chain.check_transaction_sanity(&tx)?;

        // 5. A standalone coinbase is never valid.
        if chain.is_coinbase(&tx) {
            return Err(ShellError::Invalid("coinbase as standalone transaction".into()));
        }

        // Settlement witnesses must parse before anything references them.
        extract_operations(&tx)?;
        let fee_breakdown = calculate_fee(&tx)?;

        // 6. Conflicts must all signal replaceability, and policy must allow
        //    replacement at all.
        let direct_conflicts = self.find_conflicts(inner, &tx);
        let is_replacement = !direct_conflicts.is_empty();
        if is_replacement {
            if policy.reject_replacement {
                return Err(ShellError::Duplicate(format!(
                    "{} conflicts with pool transaction and replacement is disabled",
                    txid
                )));
            }
            for conflict in &direct_conflicts {
                if !self.signals_replacement(inner, conflict) {
                    return Err(ShellError::Duplicate(format!(
                        "conflict {conflict} does not signal replacement"
                    )));
                }
            }
        }

        // 7. Chain UTXO view, with pool outputs spliced in.
        let mut view = chain.fetch_utxo_view(&tx)?;
        self.splice_pool_outputs(inner, &tx, &mut view);

        // 8. A transaction whose outputs are already unspent in the chain is
        //    a duplicate of a confirmed transaction.
        for index in 0..tx.outputs.len() as u32 {
            if let Some(entry) = view.entry(&OutPoint::new(txid, index)) {
                if !entry.is_spent() {
                    return Err(ShellError::Duplicate(format!(
                        "{txid} outputs already present in chain"
                    )));
                }
            }
        }

        // 9. Missing or spent inputs make this an orphan candidate.
        let mut missing: Vec<Hash256> = Vec::new();
        for input in &tx.inputs {
            let resolved = view
                .entry(&input.prev_out)
                .map(|e| !e.is_spent())
                .unwrap_or(false);
            if !resolved && !missing.contains(&input.prev_out.txid) {
                missing.push(input.prev_out.txid);
            }
        }
        if !missing.is_empty() {
            return Ok(AcceptOutcome::MissingParents(missing));
        }

        // 10. Consensus input checks yield the paid fee.
        let next_height = chain.best_height() + 1;
        let fee = chain.check_transaction_inputs(&tx, next_height, &view)?;

        // 11. Standardness, unless policy accepts nonstandard transactions.
        let mtp = chain.median_time_past();
        if !policy.accept_nonstandard {
            check_transaction_standard(&tx, policy, next_height, mtp)?;
            for input in &tx.inputs {
                let entry = view
                    .entry(&input.prev_out)
                    .ok_or_else(|| ShellError::Internal("resolved input vanished".into()))?;
                check_input_standard(input, entry)?;
            }
        }

        // 12. Sequence locks must allow inclusion in the next block.
        let lock = chain.calc_sequence_lock(&tx, &view)?;
        if !chain.sequence_lock_active(&lock, next_height, mtp) {
            return Err(ShellError::Nonstandard(
                "transaction sequence locks not met".into(),
            ));
        }

        // 13. Signature-operation cost cap.
        let segwit_active = chain.is_deployment_active(DEPLOYMENT_SEGWIT)?;
        let sig_op_cost = chain.get_sig_op_cost(&tx, false, &view, true, segwit_active)?;
        if sig_op_cost > policy.max_sig_op_cost_per_tx {
            return Err(ShellError::Nonstandard(format!(
                "sig op cost {sig_op_cost} exceeds {}",
                policy.max_sig_op_cost_per_tx
            )));
        }

        // 14. Fee gate.
        let vsize = tx_vsize(&tx);
        let starting_priority =
            self.check_fees(inner, &tx, fee, fee_breakdown.operation_fee, vsize, is_new, rate_limit, next_height, &view)?;

        // 15. Replace-By-Fee validation.
        if is_replacement {
            rbf::validate_replacement(inner, policy, &tx, fee, vsize, &direct_conflicts)?;
        }

        // 16. Full script validation through the adapter's caches.
        chain.validate_transaction_scripts(
            &tx,
            &view,
            STANDARD_SCRIPT_VERIFY_FLAGS,
            &self.sig_cache,
            &self.hash_cache,
        )?;

        // 17. Admission: evict replaced conflicts, then index the newcomer.
        for conflict in &direct_conflicts {
            info!(replaced = %conflict, replacement = %txid, "evicting replaced transaction");
            self.remove_locked(inner, *conflict, true);
        }

        let desc = Arc::new(TxDesc {
            tx: tx.clone(),
            txid,
            added: unix_now(),
            height: chain.best_height(),
            fee,
            fee_per_kvb: fee.saturating_mul(1_000) / vsize.max(1) as i64,
            starting_priority,
        });
        inner.pool.insert(txid, desc.clone());
        for input in &tx.inputs {
            inner.outpoints.insert(input.prev_out, txid);
        }
        self.touch();

        if let Some(estimator) = &self.cfg.fee_estimator {
            estimator.observe_transaction(&ObservedTx {
                txid,
                fee,
                vsize,
                height: desc.height,
            });
        }
        if let Some(index) = &self.cfg.address_index {
            index.add_unconfirmed_tx(&tx, &view);
        }

        info!(tx = %txid, fee, vsize, "accepted transaction");
        Ok(AcceptOutcome::Accepted(desc))
    }

    // ── Pipeline helpers ─────────────────────────────────────────────────────

    fn find_conflicts(&self, inner: &PoolInner, tx: &Transaction) -> HashSet<Hash256> {
        let mut conflicts = HashSet::new();
        for input in &tx.inputs {
            if let Some(existing) = inner.outpoints.get(&input.prev_out) {
                conflicts.insert(*existing);
            }
        }
        conflicts
    }

    /// A pool transaction signals replacement if any of its sequences is low
    /// enough, or any of its unconfirmed ancestors signals.
    fn signals_replacement(&self, inner: &PoolInner, txid: &Hash256) -> bool {
        let mut seen = HashSet::new();
        let mut work = vec![*txid];
        while let Some(id) = work.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(desc) = inner.pool.get(&id) else { continue };
            if desc.tx.signals_replacement() {
                return true;
            }
            for input in &desc.tx.inputs {
                if inner.pool.contains_key(&input.prev_out.txid) {
                    work.push(input.prev_out.txid);
                }
            }
        }
        false
    }

    /// Make unconfirmed parents' outputs visible to the view.
    fn splice_pool_outputs(&self, inner: &PoolInner, tx: &Transaction, view: &mut UtxoView) {
        for input in &tx.inputs {
            let resolved = view
                .entry(&input.prev_out)
                .map(|e| !e.is_spent())
                .unwrap_or(false);
            if resolved {
                continue;
            }
            if let Some(parent) = inner.pool.get(&input.prev_out.txid) {
                view.add_transaction_outputs(parent.txid, &parent.tx);
            }
        }
    }

    /// Step 14: the fee gate. Returns the starting priority (0 when the
    /// priority gate is not consulted).
    #[allow(clippy::too_many_arguments)]
    fn check_fees(
        &self,
        inner: &mut PoolInner,
        tx: &Transaction,
        fee: MinorUnits,
        operation_fee: MinorUnits,
        vsize: usize,
        is_new: bool,
        rate_limit: bool,
        next_height: BlockHeight,
        view: &UtxoView,
    ) -> Result<f64, ShellError> {
        let policy = &self.cfg.policy;
        let min_fee = policy.min_relay_fee(vsize);

        // Settlement surcharges are always enforced at relay.
        if fee < operation_fee {
            return Err(ShellError::InsufficientFee {
                got: fee,
                required: operation_fee,
            });
        }

        // Transactions too large for the priority carve-out must pay the
        // relay floor outright.
        let priority_ceiling = policy.block_priority_size.saturating_sub(1_000) as usize;
        if vsize >= priority_ceiling && fee < min_fee {
            return Err(ShellError::InsufficientFee {
                got: fee,
                required: min_fee,
            });
        }

        if fee >= min_fee {
            return Ok(calc_priority(tx, view, next_height, vsize));
        }
        // Re-org reinjection bypasses the free-transaction gates.
        if !is_new && !rate_limit {
            return Ok(calc_priority(tx, view, next_height, vsize));
        }

        let priority = calc_priority(tx, view, next_height, vsize);
        if is_new && !policy.disable_relay_priority && priority < MIN_HIGH_PRIORITY {
            return Err(ShellError::InsufficientFee {
                got: fee,
                required: min_fee,
            });
        }

        if rate_limit {
            let now = unix_now();
            let elapsed = (now - inner.last_penny_time).max(0);
            inner.penny_total *=
                (1.0 - 1.0 / FREE_TX_DECAY_SECS as f64).powi(elapsed.min(i32::MAX as i64) as i32);
            inner.last_penny_time = now;

            if inner.penny_total >= policy.free_tx_relay_limit * 10.0 * 1_000.0 {
                return Err(ShellError::InsufficientFee {
                    got: fee,
                    required: min_fee,
                });
            }
            inner.penny_total += vsize as f64;
            debug!(
                penny_total = inner.penny_total,
                limit = policy.free_tx_relay_limit * 10.0 * 1_000.0,
                "rate limiting free transaction"
            );
        }
        Ok(priority)
    }

    // ── Removal ──────────────────────────────────────────────────────────────

    /// Remove a transaction; optionally evict everything that spends its
    /// outputs. Iterative work list, never recursion.
    pub fn remove_transaction(&self, tx: &Transaction, remove_redeemers: bool) {
        let txid = tx_hash(tx);
        let mut inner = self.inner.write().expect("mempool lock poisoned");
        self.remove_locked(&mut inner, txid, remove_redeemers);
    }

    pub(crate) fn remove_locked(
        &self,
        inner: &mut PoolInner,
        txid: Hash256,
        remove_redeemers: bool,
    ) {
        let mut work = vec![txid];
        let mut removed = 0usize;
        while let Some(id) = work.pop() {
            let Some(desc) = inner.pool.remove(&id) else { continue };
            removed += 1;

            if remove_redeemers {
                for index in 0..desc.tx.outputs.len() as u32 {
                    if let Some(child) = inner.outpoints.get(&OutPoint::new(id, index)) {
                        work.push(*child);
                    }
                }
            }
            for input in &desc.tx.inputs {
                if inner.outpoints.get(&input.prev_out) == Some(&id) {
                    inner.outpoints.remove(&input.prev_out);
                }
            }
            self.hash_cache.remove(&id);
            if let Some(index) = &self.cfg.address_index {
                index.remove_unconfirmed_tx(&id);
            }
        }
        if removed > 0 {
            self.touch();
        }
    }

    /// Evict every pool transaction spending an outpoint the confirmed
    /// transaction consumed.
    pub fn remove_double_spends(&self, confirmed: &Transaction) {
        let confirmed_id = tx_hash(confirmed);
        let mut inner = self.inner.write().expect("mempool lock poisoned");
        for input in &confirmed.inputs {
            if let Some(existing) = inner.outpoints.get(&input.prev_out).copied() {
                if existing != confirmed_id {
                    warn!(evicted = %existing, by = %confirmed_id, "removing double spend");
                    self.remove_locked(&mut inner, existing, true);
                }
            }
        }
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn is_transaction_in_pool(&self, txid: &Hash256) -> bool {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .pool
            .contains_key(txid)
    }

    pub fn is_orphan_in_pool(&self, txid: &Hash256) -> bool {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .orphans
            .contains_key(txid)
    }

    /// In the main pool or the orphan pool.
    pub fn have_transaction(&self, txid: &Hash256) -> bool {
        let inner = self.inner.read().expect("mempool lock poisoned");
        inner.pool.contains_key(txid) || inner.orphans.contains_key(txid)
    }

    pub fn fetch_transaction(&self, txid: &Hash256) -> Option<Arc<Transaction>> {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .pool
            .get(txid)
            .map(|d| d.tx.clone())
    }

    pub fn fetch_desc(&self, txid: &Hash256) -> Option<Arc<TxDesc>> {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .pool
            .get(txid)
            .cloned()
    }

    /// The outpoint index entry for a consumed outpoint, if any.
    pub fn spending_transaction(&self, out: &OutPoint) -> Option<Hash256> {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .outpoints
            .get(out)
            .copied()
    }

    pub fn count(&self) -> usize {
        self.inner.read().expect("mempool lock poisoned").pool.len()
    }

    pub fn orphan_count(&self) -> usize {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .orphans
            .len()
    }

    pub fn tx_hashes(&self) -> Vec<Hash256> {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .pool
            .keys()
            .copied()
            .collect()
    }

    pub fn tx_descs(&self) -> Vec<Arc<TxDesc>> {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .pool
            .values()
            .cloned()
            .collect()
    }
}

/// Classic input-age priority: sum of value × confirmation depth over the
/// virtual size. Unconfirmed inputs contribute nothing.
fn calc_priority(
    tx: &Transaction,
    view: &UtxoView,
    next_height: BlockHeight,
    vsize: usize,
) -> f64 {
    let mut total = 0f64;
    for input in &tx.inputs {
        let Some(entry) = view.entry(&input.prev_out) else { continue };
        if entry.height == UNCONFIRMED_HEIGHT {
            continue;
        }
        let age = (next_height - entry.height).max(0) as f64;
        total += entry.value as f64 * age;
    }
    total / vsize.max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use shell_chain::MockChain;
    use shell_core::transaction::{TxIn, TxOut, MAX_RBF_SEQUENCE, SEQUENCE_FINAL};

    fn pool_with(chain: Arc<MockChain>, policy: Policy) -> TxPool {
        TxPool::new(MempoolConfig {
            policy,
            chain,
            address_index: None,
            fee_estimator: None,
        })
    }

    fn default_pool() -> (Arc<MockChain>, TxPool) {
        let chain = Arc::new(MockChain::new());
        let pool = pool_with(chain.clone(), Policy::default());
        (chain, pool)
    }

    /// A confirmed utxo at height 500 worth `value`.
    fn fund(chain: &MockChain, seed: u8, value: MinorUnits) -> OutPoint {
        let out = OutPoint::new(Hash256::from_bytes([seed; 32]), 0);
        chain.add_utxo(out, value, vec![0x51; 25], 500, false);
        out
    }

    /// Spend `prevs`, paying `out_value` to a 25-byte script.
    fn spend(prevs: &[OutPoint], out_value: MinorUnits, sequence: u32) -> Arc<Transaction> {
        let mut tx = Transaction::new(1);
        for prev in prevs {
            let mut input = TxIn::new(*prev);
            input.sequence = sequence;
            tx.inputs.push(input);
        }
        tx.outputs.push(TxOut::new(out_value, vec![0x51; 25]));
        Arc::new(tx)
    }

    fn submit(pool: &TxPool, tx: Arc<Transaction>) -> Result<ProcessOutcome, ShellError> {
        pool.process_transaction(tx, true, false, true, 0)
    }

    fn accepted_ids(outcome: ProcessOutcome) -> Vec<Hash256> {
        match outcome {
            ProcessOutcome::Accepted(descs) => descs.iter().map(|d| d.txid).collect(),
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    // ── Admission and indexing ───────────────────────────────────────────────

    #[test]
    fn admission_indexes_every_consumed_outpoint() {
        let (chain, pool) = default_pool();
        let a = fund(&chain, 1, 1_000_000);
        let b = fund(&chain, 2, 2_000_000);

        let tx = spend(&[a, b], 2_990_000, SEQUENCE_FINAL);
        let txid = tx_hash(&tx);
        submit(&pool, tx.clone()).unwrap();

        assert!(pool.is_transaction_in_pool(&txid));
        assert_eq!(pool.spending_transaction(&a), Some(txid));
        assert_eq!(pool.spending_transaction(&b), Some(txid));

        pool.remove_transaction(&tx, false);
        assert!(!pool.is_transaction_in_pool(&txid));
        assert_eq!(pool.spending_transaction(&a), None);
        assert_eq!(pool.spending_transaction(&b), None);
    }

    #[test]
    fn duplicate_submission_rejected() {
        let (chain, pool) = default_pool();
        let a = fund(&chain, 1, 1_000_000);
        let tx = spend(&[a], 990_000, SEQUENCE_FINAL);

        submit(&pool, tx.clone()).unwrap();
        assert!(matches!(
            submit(&pool, tx),
            Err(ShellError::Duplicate(_))
        ));
    }

    #[test]
    fn last_updated_stamped_on_admission_and_removal() {
        let (chain, pool) = default_pool();
        assert_eq!(pool.last_updated(), 0);

        let a = fund(&chain, 1, 1_000_000);
        let tx = spend(&[a], 990_000, SEQUENCE_FINAL);
        submit(&pool, tx.clone()).unwrap();
        let after_add = pool.last_updated();
        assert!(after_add > 0);

        pool.remove_transaction(&tx, false);
        assert!(pool.last_updated() >= after_add);
    }

    #[test]
    fn coinbase_rejected_outright() {
        let (_, pool) = default_pool();
        let mut tx = Transaction::new(1);
        let mut input = TxIn::new(OutPoint::null());
        input.sig_script = vec![0x03, 0xe9, 0x03];
        tx.inputs.push(input);
        tx.outputs.push(TxOut::new(50 * 100_000_000, vec![0x51; 25]));

        assert!(matches!(
            submit(&pool, Arc::new(tx)),
            Err(ShellError::Invalid(_))
        ));
    }

    // ── Size boundary ────────────────────────────────────────────────────────

    /// Bare spend with `script_len`-byte output script; stripped size is
    /// 60 + script_len.
    fn sized_tx(prev: OutPoint, value: MinorUnits, script_len: usize) -> Arc<Transaction> {
        let mut tx = Transaction::new(1);
        tx.inputs.push(TxIn::new(prev));
        tx.outputs.push(TxOut::new(value, vec![0x51; script_len]));
        Arc::new(tx)
    }

    #[test]
    fn stripped_size_64_nonstandard_65_passes() {
        let (chain, pool) = default_pool();

        let a = fund(&chain, 1, 1_000_000);
        let small = sized_tx(a, 990_000, 4);
        assert_eq!(tx_stripped_size(&small), 64);
        assert!(matches!(
            submit(&pool, small),
            Err(ShellError::Nonstandard(_))
        ));

        let b = fund(&chain, 2, 1_000_000);
        let okay = sized_tx(b, 990_000, 5);
        assert_eq!(tx_stripped_size(&okay), 65);
        submit(&pool, okay).unwrap();
    }

    // ── Fee gates ────────────────────────────────────────────────────────────

    #[test]
    fn low_priority_zero_fee_rejected() {
        let (chain, pool) = default_pool();
        let a = fund(&chain, 1, 100_000);
        let tx = spend(&[a], 100_000, SEQUENCE_FINAL); // zero fee

        assert!(matches!(
            submit(&pool, tx),
            Err(ShellError::InsufficientFee { .. })
        ));
    }

    #[test]
    fn free_tx_rate_limiter_kicks_in() {
        let chain = Arc::new(MockChain::new());
        let mut policy = Policy::default();
        policy.disable_relay_priority = true;
        policy.free_tx_relay_limit = 0.005; // 50-byte budget
        let pool = pool_with(chain.clone(), policy);

        let a = fund(&chain, 1, 100_000);
        let first = spend(&[a], 100_000, SEQUENCE_FINAL);
        pool.process_transaction(first, true, true, true, 0).unwrap();

        let b = fund(&chain, 2, 100_000);
        let second = spend(&[b], 100_000, SEQUENCE_FINAL);
        assert!(matches!(
            pool.process_transaction(second, true, true, true, 0),
            Err(ShellError::InsufficientFee { .. })
        ));
    }

    #[test]
    fn reorg_reinjection_bypasses_fee_gates() {
        let (chain, pool) = default_pool();
        let a = fund(&chain, 1, 100_000);
        let tx = spend(&[a], 100_000, SEQUENCE_FINAL); // zero fee

        // is_new = false, rate_limit = false: the re-org path.
        pool.process_transaction(tx, false, false, true, 0).unwrap();
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn sig_op_cost_cap_enforced() {
        let chain = Arc::new(MockChain::new());
        let mut policy = Policy::default();
        policy.max_sig_op_cost_per_tx = 3; // mock costs 4 per input
        let pool = pool_with(chain.clone(), policy);

        let a = fund(&chain, 1, 1_000_000);
        let tx = spend(&[a], 990_000, SEQUENCE_FINAL);
        assert!(matches!(
            submit(&pool, tx),
            Err(ShellError::Nonstandard(_))
        ));
    }

    // ── Replace-By-Fee ───────────────────────────────────────────────────────

    #[test]
    fn rbf_equal_rate_rejected_higher_rate_replaces() {
        let (chain, pool) = default_pool();
        let contested = fund(&chain, 1, 10_000_000);

        // Original pays 10_000 in fees and signals replaceability.
        let original = spend(&[contested], 9_990_000, MAX_RBF_SEQUENCE);
        let original_id = tx_hash(&original);
        submit(&pool, original).unwrap();

        // Same structure, same fee: the rate cannot strictly exceed. A
        // nonzero lock time keeps the txid distinct (still final at the next
        // height).
        let equal = {
            let mut tx = (*spend(&[contested], 9_990_000, MAX_RBF_SEQUENCE)).clone();
            tx.lock_time = 1;
            Arc::new(tx)
        };
        assert!(matches!(
            submit(&pool, equal),
            Err(ShellError::InsufficientFee { .. })
        ));
        assert!(pool.is_transaction_in_pool(&original_id));

        // 25_000 in fees at the same size: strictly higher rate and enough
        // absolute fee to cover the conflict plus relay.
        let replacement = spend(&[contested], 9_975_000, MAX_RBF_SEQUENCE);
        let replacement_id = tx_hash(&replacement);
        let ids = accepted_ids(submit(&pool, replacement).unwrap());
        assert_eq!(ids, vec![replacement_id]);
        assert!(!pool.is_transaction_in_pool(&original_id));
        assert!(pool.is_transaction_in_pool(&replacement_id));
        assert_eq!(pool.spending_transaction(&contested), Some(replacement_id));
    }

    #[test]
    fn non_signaling_conflict_blocks_replacement() {
        let (chain, pool) = default_pool();
        let contested = fund(&chain, 1, 10_000_000);

        let original = spend(&[contested], 9_990_000, SEQUENCE_FINAL);
        submit(&pool, original).unwrap();

        let replacement = spend(&[contested], 9_900_000, MAX_RBF_SEQUENCE);
        assert!(matches!(
            submit(&pool, replacement),
            Err(ShellError::Duplicate(_))
        ));
    }

    #[test]
    fn replacement_disabled_by_policy() {
        let chain = Arc::new(MockChain::new());
        let mut policy = Policy::default();
        policy.reject_replacement = true;
        let pool = pool_with(chain.clone(), policy);

        let contested = fund(&chain, 1, 10_000_000);
        submit(&pool, spend(&[contested], 9_990_000, MAX_RBF_SEQUENCE)).unwrap();
        assert!(matches!(
            submit(&pool, spend(&[contested], 9_900_000, MAX_RBF_SEQUENCE)),
            Err(ShellError::Duplicate(_))
        ));
    }

    #[test]
    fn replacement_evicts_descendants_of_conflict() {
        let (chain, pool) = default_pool();
        let contested = fund(&chain, 1, 10_000_000);

        let parent = spend(&[contested], 9_990_000, MAX_RBF_SEQUENCE);
        let parent_id = tx_hash(&parent);
        submit(&pool, parent.clone()).unwrap();

        // Child spends the conflicted parent's output.
        let child = spend(&[OutPoint::new(parent_id, 0)], 9_980_000, MAX_RBF_SEQUENCE);
        let child_id = tx_hash(&child);
        submit(&pool, child).unwrap();
        assert_eq!(pool.count(), 2);

        // Replacement must outbid parent + child fees combined.
        let replacement = spend(&[contested], 9_950_000, MAX_RBF_SEQUENCE);
        let replacement_id = tx_hash(&replacement);
        submit(&pool, replacement).unwrap();

        assert!(pool.is_transaction_in_pool(&replacement_id));
        assert!(!pool.is_transaction_in_pool(&parent_id));
        assert!(!pool.is_transaction_in_pool(&child_id));
        assert_eq!(pool.count(), 1);
    }

    // ── Orphans ──────────────────────────────────────────────────────────────

    #[test]
    fn orphan_then_parent_promotes_in_order() {
        let (chain, pool) = default_pool();
        let a = fund(&chain, 1, 10_000_000);

        let parent = spend(&[a], 9_990_000, SEQUENCE_FINAL);
        let parent_id = tx_hash(&parent);
        let child = spend(&[OutPoint::new(parent_id, 0)], 9_980_000, SEQUENCE_FINAL);
        let child_id = tx_hash(&child);

        // Child first: reported as orphan with the parent listed missing.
        match submit(&pool, child).unwrap() {
            ProcessOutcome::Orphaned(missing) => assert_eq!(missing, vec![parent_id]),
            other => panic!("expected orphan outcome, got {other:?}"),
        }
        assert!(pool.is_orphan_in_pool(&child_id));
        assert!(pool
            .orphans_waiting_on(&OutPoint::new(parent_id, 0))
            .contains(&child_id));

        // Parent arrives: both admitted, parent first.
        let ids = accepted_ids(submit(&pool, parent).unwrap());
        assert_eq!(ids, vec![parent_id, child_id]);
        assert!(!pool.is_orphan_in_pool(&child_id));
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn orphan_rejected_without_opt_in() {
        let (chain, pool) = default_pool();
        let _ = chain; // parent never funded
        let ghost = OutPoint::new(Hash256::from_bytes([0x42; 32]), 0);
        let tx = spend(&[ghost], 1_000_000, SEQUENCE_FINAL);

        match pool.process_transaction(tx, true, false, false, 0) {
            Err(ShellError::Orphan { parents }) => {
                assert_eq!(parents, vec![Hash256::from_bytes([0x42; 32])])
            }
            other => panic!("expected orphan error, got {other:?}"),
        }
        assert_eq!(pool.orphan_count(), 0);
    }

    #[test]
    fn orphan_pool_capacity_evicts_arbitrary_entry() {
        let chain = Arc::new(MockChain::new());
        let mut policy = Policy::default();
        policy.max_orphan_txs = 2;
        let pool = pool_with(chain.clone(), policy);

        for seed in 10u8..13 {
            let ghost = OutPoint::new(Hash256::from_bytes([seed; 32]), 0);
            let tx = spend(&[ghost], 1_000_000, SEQUENCE_FINAL);
            pool.process_transaction(tx, true, false, true, 0).unwrap();
        }
        // Bound holds; one of the three was evicted.
        assert_eq!(pool.orphan_count(), 2);
    }

    #[test]
    fn oversized_orphan_rejected() {
        let chain = Arc::new(MockChain::new());
        let mut policy = Policy::default();
        policy.max_orphan_tx_size = 70;
        let pool = pool_with(chain.clone(), policy);

        let ghost = OutPoint::new(Hash256::from_bytes([0x42; 32]), 0);
        let mut tx = Transaction::new(1);
        tx.inputs.push(TxIn::new(ghost));
        tx.outputs.push(TxOut::new(1_000_000, vec![0x51; 64]));
        assert!(matches!(
            pool.process_transaction(Arc::new(tx), true, false, true, 0),
            Err(ShellError::Nonstandard(_))
        ));
    }

    #[test]
    fn orphans_removable_by_source_tag() {
        let (_, pool) = default_pool();
        for (seed, tag) in [(10u8, 7u64), (11, 7), (12, 9)] {
            let ghost = OutPoint::new(Hash256::from_bytes([seed; 32]), 0);
            let tx = spend(&[ghost], 1_000_000, SEQUENCE_FINAL);
            pool.process_transaction(tx, true, false, true, tag).unwrap();
        }
        assert_eq!(pool.orphan_count(), 3);
        assert_eq!(pool.remove_orphans_by_tag(7), 2);
        assert_eq!(pool.orphan_count(), 1);
    }

    // ── Block connection ─────────────────────────────────────────────────────

    #[test]
    fn double_spend_eviction_is_recursive() {
        let (chain, pool) = default_pool();
        let contested = fund(&chain, 1, 10_000_000);

        let parent = spend(&[contested], 9_990_000, SEQUENCE_FINAL);
        let parent_id = tx_hash(&parent);
        submit(&pool, parent).unwrap();
        let child = spend(&[OutPoint::new(parent_id, 0)], 9_980_000, SEQUENCE_FINAL);
        submit(&pool, child).unwrap();

        // A confirmed transaction spends the contested outpoint.
        let confirmed = spend(&[contested], 9_999_000, SEQUENCE_FINAL);
        pool.remove_double_spends(&confirmed);

        assert_eq!(pool.count(), 0);
        assert_eq!(pool.spending_transaction(&contested), None);
    }

    #[test]
    fn pool_transactions_have_disjoint_inputs() {
        let (chain, pool) = default_pool();
        let a = fund(&chain, 1, 1_000_000);
        let b = fund(&chain, 2, 1_000_000);
        submit(&pool, spend(&[a], 990_000, SEQUENCE_FINAL)).unwrap();
        submit(&pool, spend(&[b], 990_000, SEQUENCE_FINAL)).unwrap();

        let descs = pool.tx_descs();
        let mut seen = HashSet::new();
        for desc in &descs {
            for input in &desc.tx.inputs {
                assert!(seen.insert(input.prev_out), "inputs overlap across pool");
            }
        }
    }

    #[test]
    fn chain_spent_input_makes_orphan_candidate() {
        let (chain, pool) = default_pool();
        let a = fund(&chain, 1, 1_000_000);

        // Confirm a spend of `a`, then try to submit another spend of it.
        let confirmed = spend(&[a], 999_000, SEQUENCE_FINAL);
        chain.connect_transaction(&confirmed, 600);

        let conflict = spend(&[a], 990_000, SEQUENCE_FINAL);
        match pool.process_transaction(conflict, true, false, true, 0).unwrap() {
            ProcessOutcome::Orphaned(missing) => assert_eq!(missing, vec![a.txid]),
            other => panic!("expected orphan outcome, got {other:?}"),
        }
    }
}
