//! Replace-By-Fee validation (step 15 of the acceptance pipeline).
//!
//! The conflict set is the direct conflicts plus every in-pool descendant;
//! all rules run against that set. Partial failures report the first
//! offender.

use std::collections::HashSet;

use shell_core::constants::MAX_REPLACEMENT_EVICTIONS;
use shell_core::error::ShellError;
use shell_core::policy::Policy;
use shell_core::transaction::Transaction;
use shell_core::types::{Hash256, MinorUnits, OutPoint};

use crate::pool::PoolInner;

/// Validate a replacement against its direct conflicts. Returns the full
/// conflict set (conflicts ∪ descendants) on success.
pub(crate) fn validate_replacement(
    inner: &PoolInner,
    policy: &Policy,
    tx: &Transaction,
    fee: MinorUnits,
    vsize: usize,
    direct_conflicts: &HashSet<Hash256>,
) -> Result<HashSet<Hash256>, ShellError> {
    let conflict_set = collect_conflict_set(inner, direct_conflicts);
    if conflict_set.len() > MAX_REPLACEMENT_EVICTIONS {
        return Err(ShellError::Nonstandard(format!(
            "replacement evicts {} transactions, limit {MAX_REPLACEMENT_EVICTIONS}",
            conflict_set.len()
        )));
    }

    // No parent replacement: the replacement may not spend an output of
    // anything it would evict.
    for input in &tx.inputs {
        if conflict_set.contains(&input.prev_out.txid) {
            return Err(ShellError::Invalid(format!(
                "replacement spends output of conflicting transaction {}",
                input.prev_out.txid
            )));
        }
    }

    // Strictly higher fee rate than every conflict.
    let fee_per_kvb = fee.saturating_mul(1_000) / vsize.max(1) as i64;
    let mut conflict_fees: MinorUnits = 0;
    for conflict_id in &conflict_set {
        let desc = inner
            .pool
            .get(conflict_id)
            .ok_or_else(|| ShellError::Internal("conflict left the pool mid-check".into()))?;
        if fee_per_kvb <= desc.fee_per_kvb {
            return Err(ShellError::InsufficientFee {
                got: fee_per_kvb,
                required: desc.fee_per_kvb,
            });
        }
        conflict_fees = conflict_fees.saturating_add(desc.fee);
    }

    // Absolute fee must cover everything evicted plus relay of the
    // replacement itself.
    let required = conflict_fees.saturating_add(policy.min_relay_fee(vsize));
    if fee < required {
        return Err(ShellError::InsufficientFee { got: fee, required });
    }

    // No new unconfirmed inputs beyond the conflicts' own ancestry.
    let ancestors = collect_conflict_ancestors(inner, direct_conflicts);
    for input in &tx.inputs {
        let parent = input.prev_out.txid;
        if inner.pool.contains_key(&parent) && !ancestors.contains(&parent) {
            return Err(ShellError::Nonstandard(format!(
                "replacement adds new unconfirmed input {parent}"
            )));
        }
    }

    Ok(conflict_set)
}

/// Direct conflicts plus all of their in-pool descendants, found through
/// the outpoint index with an explicit work list.
fn collect_conflict_set(
    inner: &PoolInner,
    direct_conflicts: &HashSet<Hash256>,
) -> HashSet<Hash256> {
    let mut set: HashSet<Hash256> = direct_conflicts.clone();
    let mut work: Vec<Hash256> = direct_conflicts.iter().copied().collect();
    while let Some(id) = work.pop() {
        let Some(desc) = inner.pool.get(&id) else { continue };
        for index in 0..desc.tx.outputs.len() as u32 {
            if let Some(child) = inner.outpoints.get(&OutPoint::new(id, index)) {
                if set.insert(*child) {
                    work.push(*child);
                }
            }
        }
    }
    set
}

/// In-pool ancestors of the direct conflicts (the conflicts themselves
/// included).
fn collect_conflict_ancestors(
    inner: &PoolInner,
    direct_conflicts: &HashSet<Hash256>,
) -> HashSet<Hash256> {
    let mut set: HashSet<Hash256> = direct_conflicts.clone();
    let mut work: Vec<Hash256> = direct_conflicts.iter().copied().collect();
    while let Some(id) = work.pop() {
        let Some(desc) = inner.pool.get(&id) else { continue };
        for input in &desc.tx.inputs {
            let parent = input.prev_out.txid;
            if inner.pool.contains_key(&parent) && set.insert(parent) {
                work.push(parent);
            }
        }
    }
    set
}
