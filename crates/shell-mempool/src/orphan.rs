//! Orphan-pool bookkeeping: TTL-based expiry, capacity eviction, the
//! reverse index by missing parent outpoint, and breadth-first promotion of
//! orphans once their parents arrive.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, warn};

use shell_core::constants::{ORPHAN_EXPIRE_SCAN_INTERVAL_SECS, ORPHAN_TTL_SECS};
use shell_core::error::ShellError;
use shell_core::transaction::Transaction;
use shell_core::types::{Hash256, OutPoint};
use shell_wire::{tx_hash, tx_total_size};

use crate::pool::{unix_now, OrphanTx, PoolInner, Tag, TxDesc, TxPool};

impl TxPool {
    /// Add an orphan after its admission attempt reported missing parents.
    pub(crate) fn add_orphan_locked(
        &self,
        inner: &mut PoolInner,
        tx: Arc<Transaction>,
        tag: Tag,
    ) -> Result<(), ShellError> {
        let size = tx_total_size(&tx);
        let max_size = self.policy().max_orphan_tx_size;
        if size > max_size {
            return Err(ShellError::Nonstandard(format!(
                "orphan of {size} bytes exceeds maximum {max_size}"
            )));
        }
        if self.policy().max_orphan_txs == 0 {
            return Ok(());
        }

        self.limit_orphans_locked(inner);

        let txid = tx_hash(&tx);
        for input in &tx.inputs {
            inner
                .orphans_by_prev
                .entry(input.prev_out)
                .or_default()
                .insert(txid);
        }
        inner.orphans.insert(
            txid,
            OrphanTx {
                tx,
                txid,
                tag,
                expiration: unix_now() + ORPHAN_TTL_SECS,
            },
        );
        self.touch();
        debug!(orphan = %txid, total = inner.orphans.len(), "stored orphan transaction");
        Ok(())
    }

    /// Expire old orphans (at most once per scan interval), then make room
    /// by evicting an arbitrary entry if the pool is full.
    fn limit_orphans_locked(&self, inner: &mut PoolInner) {
        let now = unix_now();
        if now >= inner.next_orphan_scan {
            let expired: Vec<Hash256> = inner
                .orphans
                .values()
                .filter(|o| now > o.expiration)
                .map(|o| o.txid)
                .collect();
            for txid in &expired {
                // Expiry removes redeemers too: their parent is gone for good.
                self.remove_orphan_locked(inner, *txid, true);
            }
            inner.next_orphan_scan = now + ORPHAN_EXPIRE_SCAN_INTERVAL_SECS;
            if !expired.is_empty() {
                debug!(count = expired.len(), "expired orphan transactions");
            }
        }

        while inner.orphans.len() >= self.policy().max_orphan_txs {
            // Any entry will do; iteration order is as arbitrary as a random
            // draw here. No redeemer removal, so a later parent arrival can
            // still rescue the children.
            let Some(victim) = inner.orphans.keys().next().copied() else { break };
            warn!(orphan = %victim, "orphan pool full, evicting");
            self.remove_orphan_locked(inner, victim, false);
        }
    }

    /// Remove one orphan; optionally remove the orphans that spend it.
    pub(crate) fn remove_orphan_locked(
        &self,
        inner: &mut PoolInner,
        txid: Hash256,
        remove_redeemers: bool,
    ) {
        let mut work = vec![txid];
        while let Some(id) = work.pop() {
            let Some(orphan) = inner.orphans.remove(&id) else { continue };
            for input in &orphan.tx.inputs {
                if let Some(waiters) = inner.orphans_by_prev.get_mut(&input.prev_out) {
                    waiters.remove(&id);
                    if waiters.is_empty() {
                        inner.orphans_by_prev.remove(&input.prev_out);
                    }
                }
            }
            if remove_redeemers {
                for index in 0..orphan.tx.outputs.len() as u32 {
                    if let Some(children) = inner.orphans_by_prev.get(&OutPoint::new(id, index)) {
                        work.extend(children.iter().copied());
                    }
                }
            }
        }
        self.touch();
    }

    /// Public removal entry point.
    pub fn remove_orphan(&self, txid: &Hash256) {
        let mut inner = self.inner_write();
        self.remove_orphan_locked(&mut inner, *txid, false);
    }

    /// Drop every orphan recorded with the given source tag. Returns how
    /// many were removed.
    pub fn remove_orphans_by_tag(&self, tag: Tag) -> usize {
        let mut inner = self.inner_write();
        let victims: Vec<Hash256> = inner
            .orphans
            .values()
            .filter(|o| o.tag == tag)
            .map(|o| o.txid)
            .collect();
        for txid in &victims {
            self.remove_orphan_locked(&mut inner, *txid, false);
        }
        victims.len()
    }

    /// Breadth-first promotion: each output of a newly accepted transaction
    /// may satisfy orphans, which in turn may satisfy more.
    pub(crate) fn process_orphans_locked(
        &self,
        inner: &mut PoolInner,
        first: Arc<TxDesc>,
        rate_limit: bool,
    ) -> Vec<Arc<TxDesc>> {
        let mut promoted = Vec::new();
        let mut queue: VecDeque<Arc<TxDesc>> = VecDeque::from([first]);

        while let Some(desc) = queue.pop_front() {
            for index in 0..desc.tx.outputs.len() as u32 {
                let outpoint = OutPoint::new(desc.txid, index);
                let Some(waiters) = inner.orphans_by_prev.get(&outpoint) else { continue };
                let waiters: Vec<Hash256> = waiters.iter().copied().collect();

                for orphan_id in waiters {
                    let Some(orphan) = inner.orphans.get(&orphan_id) else { continue };
                    let orphan_tx = orphan.tx.clone();
                    match self.retry_orphan(inner, orphan_tx, rate_limit) {
                        RetryOutcome::Accepted(d) => {
                            self.remove_orphan_locked(inner, orphan_id, false);
                            promoted.push(d.clone());
                            queue.push_back(d);
                        }
                        RetryOutcome::StillMissing => {}
                        RetryOutcome::Rejected(err) => {
                            warn!(orphan = %orphan_id, %err, "orphan failed acceptance, discarding");
                            self.remove_orphan_locked(inner, orphan_id, true);
                        }
                    }
                }
            }
        }
        promoted
    }

    fn retry_orphan(
        &self,
        inner: &mut PoolInner,
        tx: Arc<Transaction>,
        rate_limit: bool,
    ) -> RetryOutcome {
        match self.maybe_accept_for_orphan(inner, tx, rate_limit) {
            Ok(Some(desc)) => RetryOutcome::Accepted(desc),
            Ok(None) => RetryOutcome::StillMissing,
            Err(err) => RetryOutcome::Rejected(err),
        }
    }

    /// The set of orphans currently waiting on an outpoint. Test hook.
    pub fn orphans_waiting_on(&self, out: &OutPoint) -> HashSet<Hash256> {
        self.inner_read()
            .orphans_by_prev
            .get(out)
            .cloned()
            .unwrap_or_default()
    }
}

enum RetryOutcome {
    Accepted(Arc<TxDesc>),
    StillMissing,
    Rejected(ShellError),
}
