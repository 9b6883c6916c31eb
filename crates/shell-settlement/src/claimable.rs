use std::collections::HashMap;
use std::sync::RwLock;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::info;

use shell_core::constants::MAX_CLAIMANTS;
use shell_core::error::ShellError;
use shell_core::types::{BalanceId, BlockHeight, Hash256, MinorUnits, OutPoint, Timestamp};
use shell_crypto::hash::sha256;
use shell_script::Predicate;
use shell_wire::encode_outpoint;

/// One claimant entry: a destination key and the predicate guarding it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claimant {
    pub destination: PublicKey,
    pub predicate: Predicate,
}

/// A multi-party escrow balance. Exists until exactly one successful claim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimableBalance {
    pub balance_id: BalanceId,
    pub creator: PublicKey,
    pub amount: MinorUnits,
    pub claimants: Vec<Claimant>,
    pub create_height: BlockHeight,
    pub funding_outpoint: OutPoint,
}

/// Deterministic balance id: SHA-256 over creator key, amount, funding
/// outpoint and creation height.
pub fn derive_balance_id(
    creator: &PublicKey,
    amount: MinorUnits,
    funding: &OutPoint,
    create_height: BlockHeight,
) -> BalanceId {
    let mut buf = Vec::with_capacity(33 + 8 + 36 + 4);
    buf.extend_from_slice(&creator.serialize());
    buf.extend_from_slice(&amount.to_le_bytes());
    buf.extend_from_slice(&encode_outpoint(funding));
    buf.extend_from_slice(&create_height.to_le_bytes());
    BalanceId(Hash256::from_bytes(sha256(&buf)))
}

/// Registry of live claimable balances. Claimed balances are removed.
#[derive(Debug, Default)]
pub struct ClaimableRegistry {
    balances: RwLock<HashMap<BalanceId, ClaimableBalance>>,
}

impl ClaimableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        creator: PublicKey,
        amount: MinorUnits,
        claimants: Vec<Claimant>,
        create_height: BlockHeight,
        funding_outpoint: OutPoint,
    ) -> Result<BalanceId, ShellError> {
        if amount <= 0 {
            return Err(ShellError::Invalid(
                "claimable amount must be positive".into(),
            ));
        }
        if claimants.is_empty() || claimants.len() > MAX_CLAIMANTS {
            return Err(ShellError::Invalid(format!(
                "claimant count must be 1..={MAX_CLAIMANTS}, got {}",
                claimants.len()
            )));
        }

        let balance_id = derive_balance_id(&creator, amount, &funding_outpoint, create_height);
        let mut balances = self.balances.write().expect("claimable registry poisoned");
        if balances.contains_key(&balance_id) {
            return Err(ShellError::Duplicate(format!(
                "claimable balance {balance_id}"
            )));
        }
        balances.insert(
            balance_id,
            ClaimableBalance {
                balance_id,
                creator,
                amount,
                claimants,
                create_height,
                funding_outpoint,
            },
        );
        info!(balance = %balance_id, amount, "created claimable balance");
        Ok(balance_id)
    }

    /// Claim a balance. The first claimant whose destination matches the
    /// claimer and whose predicate holds wins; the balance is then gone.
    /// `now` is the predicate-evaluation timestamp resolved by the caller
    /// from chain state, never the system clock.
    pub fn claim(
        &self,
        balance_id: &BalanceId,
        claimer: &PublicKey,
        proof: &[u8],
        now: Timestamp,
    ) -> Result<ClaimableBalance, ShellError> {
        let mut balances = self.balances.write().expect("claimable registry poisoned");
        let balance = balances
            .get(balance_id)
            .ok_or(ShellError::UnknownBalance(*balance_id))?;

        let mut key_matched = false;
        let mut satisfied = false;
        for claimant in &balance.claimants {
            if claimant.destination != *claimer {
                continue;
            }
            key_matched = true;
            if claimant.predicate.evaluate(proof, now) {
                satisfied = true;
                break;
            }
        }
        if !key_matched {
            return Err(ShellError::NoMatchingClaimant);
        }
        if !satisfied {
            return Err(ShellError::PredicateUnsatisfied);
        }

        let claimed = balances.remove(balance_id).expect("present under lock");
        info!(balance = %balance_id, amount = claimed.amount, "claimed balance");
        Ok(claimed)
    }

    pub fn get(&self, balance_id: &BalanceId) -> Option<ClaimableBalance> {
        self.balances
            .read()
            .expect("claimable registry poisoned")
            .get(balance_id)
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.balances
            .read()
            .expect("claimable registry poisoned")
            .len()
    }
}
