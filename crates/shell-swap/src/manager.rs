use std::collections::HashMap;
use std::sync::RwLock;

use secp256k1::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::info;

use shell_core::error::ShellError;
use shell_core::transaction::Transaction;
use shell_core::types::{Hash256, MinorUnits, SwapId, Timestamp};
use shell_crypto::hash::sha256;

use crate::htlc::extract_secret;

/// Lifecycle of an atomic swap. `Redeemed`, `Refunded` and `Expired` are
/// terminal; a swap reaches at most one of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapStatus {
    /// Created, contract not yet confirmed.
    Pending,
    /// Contract transaction confirmed.
    Active,
    /// Secret revealed on-chain.
    Redeemed,
    /// Timeout reached and refund spent.
    Refunded,
    /// Timeout passed with no terminal transition.
    Expired,
}

impl SwapStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Redeemed | SwapStatus::Refunded | SwapStatus::Expired
        )
    }
}

/// Inputs to `new_swap`.
#[derive(Clone, Debug)]
pub struct SwapParams {
    pub initiator: PublicKey,
    pub participant: PublicKey,
    pub amount: MinorUnits,
    /// Absolute Unix timeout.
    pub timeout: Timestamp,
    /// SHA-256 of the secret. The secret itself never reaches the manager.
    pub secret_hash: Hash256,
    /// Which chain this leg settles on.
    pub chain_tag: String,
}

/// A tracked swap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AtomicSwap {
    pub swap_id: SwapId,
    pub initiator: PublicKey,
    pub participant: PublicKey,
    pub amount: MinorUnits,
    pub timeout: Timestamp,
    pub secret_hash: Hash256,
    pub chain_tag: String,
    pub status: SwapStatus,
}

/// Canonical swap id over every identity field.
pub fn derive_swap_id(params: &SwapParams) -> SwapId {
    let mut buf = Vec::with_capacity(33 + 33 + 8 + 8 + 32 + params.chain_tag.len());
    buf.extend_from_slice(&params.initiator.serialize());
    buf.extend_from_slice(&params.participant.serialize());
    buf.extend_from_slice(&params.amount.to_le_bytes());
    buf.extend_from_slice(&params.timeout.to_le_bytes());
    buf.extend_from_slice(params.secret_hash.as_bytes());
    buf.extend_from_slice(params.chain_tag.as_bytes());
    SwapId(Hash256::from_bytes(sha256(&buf)))
}

/// Registry of swaps this node participates in.
#[derive(Debug, Default)]
pub struct SwapManager {
    swaps: RwLock<HashMap<SwapId, AtomicSwap>>,
}

impl SwapManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new swap in `Pending` state.
    pub fn new_swap(&self, params: SwapParams) -> Result<SwapId, ShellError> {
        if params.amount <= 0 {
            return Err(ShellError::Invalid("swap amount must be positive".into()));
        }
        if params.timeout <= 0 {
            return Err(ShellError::Invalid("swap timeout must be positive".into()));
        }

        let swap_id = derive_swap_id(&params);
        let mut swaps = self.swaps.write().expect("swap manager poisoned");
        if swaps.contains_key(&swap_id) {
            return Err(ShellError::Duplicate(format!("swap {swap_id}")));
        }
        swaps.insert(
            swap_id,
            AtomicSwap {
                swap_id,
                initiator: params.initiator,
                participant: params.participant,
                amount: params.amount,
                timeout: params.timeout,
                secret_hash: params.secret_hash,
                chain_tag: params.chain_tag,
                status: SwapStatus::Pending,
            },
        );
        info!(swap = %swap_id, "registered swap");
        Ok(swap_id)
    }

    /// Create the two legs of a cross-chain swap sharing one secret hash.
    /// The peer leg mirrors the roles and halves the timeout so the
    /// counterparty always has time to react to a reveal.
    pub fn create_cross_chain_swap(
        &self,
        params: SwapParams,
        peer_chain: &str,
    ) -> Result<(SwapId, SwapId), ShellError> {
        let peer_params = SwapParams {
            initiator: params.participant,
            participant: params.initiator,
            amount: params.amount,
            timeout: params.timeout / 2,
            secret_hash: params.secret_hash,
            chain_tag: peer_chain.to_string(),
        };
        let local = self.new_swap(params)?;
        let peer = self.new_swap(peer_params)?;
        Ok((local, peer))
    }

    pub fn get(&self, swap_id: &SwapId) -> Option<AtomicSwap> {
        self.swaps
            .read()
            .expect("swap manager poisoned")
            .get(swap_id)
            .cloned()
    }

    pub fn list(&self) -> Vec<AtomicSwap> {
        self.swaps
            .read()
            .expect("swap manager poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Contract confirmed: Pending → Active.
    pub fn mark_active(&self, swap_id: &SwapId) -> Result<(), ShellError> {
        self.transition(swap_id, SwapStatus::Pending, SwapStatus::Active)
    }

    /// Record a redeem: extracts the secret from the transaction, checks it
    /// against the committed hash, and moves the swap to `Redeemed`.
    /// Returns the revealed secret.
    pub fn redeem(&self, swap_id: &SwapId, redeem_tx: &Transaction) -> Result<Vec<u8>, ShellError> {
        let secret = extract_secret(redeem_tx)?;
        let mut swaps = self.swaps.write().expect("swap manager poisoned");
        let swap = swaps
            .get_mut(swap_id)
            .ok_or_else(|| ShellError::Invalid(format!("unknown swap {swap_id}")))?;

        if swap.status != SwapStatus::Active {
            return Err(ShellError::Invalid(format!(
                "swap {swap_id} is not active ({:?})",
                swap.status
            )));
        }
        if sha256(&secret) != *swap.secret_hash.as_bytes() {
            return Err(ShellError::Invalid(
                "revealed secret does not match committed hash".into(),
            ));
        }
        swap.status = SwapStatus::Redeemed;
        info!(swap = %swap_id, "swap redeemed");
        Ok(secret)
    }

    /// Record a refund spend: Active → Refunded, only once the timeout has
    /// passed.
    pub fn refund(&self, swap_id: &SwapId, now: Timestamp) -> Result<(), ShellError> {
        let mut swaps = self.swaps.write().expect("swap manager poisoned");
        let swap = swaps
            .get_mut(swap_id)
            .ok_or_else(|| ShellError::Invalid(format!("unknown swap {swap_id}")))?;
        if swap.status != SwapStatus::Active {
            return Err(ShellError::Invalid(format!(
                "swap {swap_id} is not active ({:?})",
                swap.status
            )));
        }
        if now < swap.timeout {
            return Err(ShellError::TimeoutNotReached {
                timeout: swap.timeout,
            });
        }
        swap.status = SwapStatus::Refunded;
        info!(swap = %swap_id, "swap refunded");
        Ok(())
    }

    /// Sweep non-terminal swaps whose timeout has passed, marking them
    /// `Expired`. Returns how many were swept.
    pub fn cleanup_expired(&self, now: Timestamp) -> usize {
        let mut swaps = self.swaps.write().expect("swap manager poisoned");
        let mut swept = 0usize;
        for swap in swaps.values_mut() {
            if !swap.status.is_terminal() && swap.timeout < now {
                swap.status = SwapStatus::Expired;
                swept += 1;
            }
        }
        if swept > 0 {
            info!(count = swept, "expired swaps");
        }
        swept
    }

    fn transition(
        &self,
        swap_id: &SwapId,
        from: SwapStatus,
        to: SwapStatus,
    ) -> Result<(), ShellError> {
        let mut swaps = self.swaps.write().expect("swap manager poisoned");
        let swap = swaps
            .get_mut(swap_id)
            .ok_or_else(|| ShellError::Invalid(format!("unknown swap {swap_id}")))?;
        if swap.status != from {
            return Err(ShellError::Invalid(format!(
                "swap {swap_id} is {:?}, expected {from:?}",
                swap.status
            )));
        }
        swap.status = to;
        Ok(())
    }
}
